use crate::board::{Board, Move, NUM_POINTS, Source, Target};
use crate::types::Color;

fn is_die(value: u8) -> bool {
    (1..=6).contains(&value)
}

/// Returns the legal single-die moves for `color` with the given dice values
/// (duplicates allowed), deduplicated by `(from, to, die)`.
///
/// - Checkers on the bar must enter before anything else moves.
/// - A point held by two or more opposing checkers is blocked.
/// - Bearing off needs all fifteen checkers home; a die larger than the
///   distance may bear off only the furthest-back checker.
pub fn legal_moves(board: &Board, color: Color, dice: &[u8]) -> Vec<Move> {
    let mut moves: Vec<Move> = Vec::new();
    let mut push = |mv: Move| {
        if !moves.contains(&mv) {
            moves.push(mv);
        }
    };

    if board.bar(color) > 0 {
        for &die in dice.iter().filter(|&&die| is_die(die)) {
            let entry = color.entry_point(die);
            if board.is_open_for(color, entry) {
                push(Move::new(Source::Bar, Target::Point(entry), die));
            }
        }
        return moves;
    }

    let can_bear_off = board.all_home(color);
    let furthest = if can_bear_off {
        board.furthest_back(color)
    } else {
        None
    };

    for point in 1..=NUM_POINTS {
        if board.count(color, point) == 0 {
            continue;
        }
        for &die in dice.iter().filter(|&&die| is_die(die)) {
            match color.advance(point, die) {
                Some(target) => {
                    if board.is_open_for(color, target) {
                        push(Move::new(Source::Point(point), Target::Point(target), die));
                    }
                }
                None if can_bear_off => {
                    let distance = color.distance(point);
                    let overshoot = die > distance && furthest == Some(point);
                    if die == distance || overshoot {
                        push(Move::new(Source::Point(point), Target::Off, die));
                    }
                }
                None => {}
            }
        }
    }

    moves
}
