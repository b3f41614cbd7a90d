use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::board::{Board, Move, Source, Target};
use crate::dice::{DiceRoller, Roll};
use crate::error::EngineError;
use crate::movegen::legal_moves;
use crate::types::{Color, PositionView};

/// A recommended opening play for White.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookPlay {
    pub name: &'static str,
    pub description: &'static str,
    /// Points the play lands on.
    pub points: &'static [u8],
    #[serde(skip)]
    steps: &'static [(u8, u8)],
}

impl BookPlay {
    /// Single-die moves of the play, in the order they are shown.
    pub fn moves(&self) -> Vec<Move> {
        self.steps
            .iter()
            .map(|&(from, to)| Move::new(Source::Point(from), Target::Point(to), from - to))
            .collect()
    }

    /// Position after the play from the starting position.
    pub fn resulting_board(&self) -> Result<Board, EngineError> {
        self.moves()
            .into_iter()
            .try_fold(Board::new(), |board, mv| board.with_move(Color::White, mv))
    }
}

const fn play(
    name: &'static str,
    description: &'static str,
    points: &'static [u8],
    steps: &'static [(u8, u8)],
) -> BookPlay {
    BookPlay {
        name,
        description,
        points,
        steps,
    }
}

const SLOT_FIVE: &str =
    "If you wish to gamble, slotting your 5-point and bringing one down is another option.";
const BOTH_SIDES: &str = "By far the most popular move for this roll. This is because it advances checkers on both sides of the board.";

/// Opening plays keyed by `"low,high"` for the fifteen non-double rolls.
pub static OPENING_BOOK: Lazy<HashMap<&'static str, Vec<BookPlay>>> = Lazy::new(|| {
    HashMap::from([
        (
            "1,2",
            vec![
                play(
                    "24/23 13/11",
                    "Split your back checkers and bring one checker down.",
                    &[23, 11],
                    &[(24, 23), (13, 11)],
                ),
                play("6/5 13/11", SLOT_FIVE, &[5, 11], &[(6, 5), (13, 11)]),
            ],
        ),
        (
            "1,3",
            vec![play(
                "8/5 6/5",
                "This is the best opening roll. You should secure your 5-point. Do not consider any other moves for this roll.",
                &[5],
                &[(8, 5), (6, 5)],
            )],
        ),
        (
            "2,3",
            vec![play(
                "24/21 13/11",
                "Split your back checkers 3 and bring a checker down from the midpoint.",
                &[21, 11],
                &[(24, 21), (13, 11)],
            )],
        ),
        (
            "1,4",
            vec![
                play(
                    "24/23 13/9",
                    "Split the back checkers and bring one checker down from the midpoint.",
                    &[23, 9],
                    &[(24, 23), (13, 9)],
                ),
                play("6/5 13/9", SLOT_FIVE, &[5, 9], &[(6, 5), (13, 9)]),
            ],
        ),
        (
            "2,4",
            vec![play(
                "8/4 6/4",
                "The best move is to secure your 4-point.",
                &[4],
                &[(8, 4), (6, 4)],
            )],
        ),
        (
            "3,4",
            vec![play(
                "24/21 13/9",
                "The best based on computerised rollout. Splits the back checkers and brings down a builder that can be used to form points further along the board on subsequent rolls.",
                &[21, 9],
                &[(24, 21), (13, 9)],
            )],
        ),
        (
            "1,5",
            vec![
                play(
                    "24/23 13/8",
                    "Split the back checkers and bring one checker down from the midpoint.",
                    &[23, 8],
                    &[(24, 23), (13, 8)],
                ),
                play("6/5 13/8", SLOT_FIVE, &[5, 8], &[(6, 5), (13, 8)]),
            ],
        ),
        (
            "2,5",
            vec![play(
                "24/22 13/8",
                "Has the best results based on computerised rollout. Splits the back pair, leaving them relatively unlikely to be hit, but in position to form an advanced anchor.",
                &[22, 8],
                &[(24, 22), (13, 8)],
            )],
        ),
        (
            "3,5",
            vec![play(
                "8/3 6/3",
                "The best move is to secure your 3-point.",
                &[3],
                &[(8, 3), (6, 3)],
            )],
        ),
        (
            "4,5",
            vec![play(
                "24/20 13/8",
                "The best option for this roll, based on rollouts. It's a balanced play, creating opportunities on both sides of the board.",
                &[20, 8],
                &[(24, 20), (13, 8)],
            )],
        ),
        (
            "1,6",
            vec![play(
                "13/7 8/7",
                "The third best opening roll. The only option worth considering is to secure your bar point.",
                &[7],
                &[(13, 7), (8, 7)],
            )],
        ),
        (
            "2,6",
            vec![play("24/18 13/11", BOTH_SIDES, &[18, 11], &[(24, 18), (13, 11)])],
        ),
        (
            "3,6",
            vec![play("24/18 13/10", BOTH_SIDES, &[18, 10], &[(24, 18), (13, 10)])],
        ),
        (
            "4,6",
            vec![play(
                "24/14",
                "Computerised rollouts confirm that the best move is to make the 24/14 running play.",
                &[14],
                &[(24, 18), (18, 14)],
            )],
        ),
        (
            "5,6",
            vec![play(
                "24/18 18/13",
                "Rollouts confirm that the best move is to run one of your back checkers to the midpoint. This move is known as the Lovers Leap.",
                &[13],
                &[(24, 18), (18, 13)],
            )],
        ),
    ])
});

/// Book key for a roll, lower die first.
pub fn book_key(roll: Roll) -> String {
    let [a, b] = roll.values;
    format!("{},{}", a.min(b), a.max(b))
}

/// Book plays for `roll`; empty for doubles.
pub fn lookup(roll: Roll) -> &'static [BookPlay] {
    OPENING_BOOK
        .get(book_key(roll).as_str())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Index of the first book play for `roll` that produces `board`. Plays are
/// compared by resulting position, so move order and notation do not matter.
pub fn matching_play(roll: Roll, board: &Board) -> Option<usize> {
    lookup(roll)
        .iter()
        .position(|play| play.resulting_board().is_ok_and(|result| result == *board))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpeningVerdict {
    pub is_correct: bool,
    pub matched: Option<usize>,
    /// The player's moves, sorted, e.g. `6/5 8/5`.
    pub player_moves: String,
    pub book: &'static [BookPlay],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrillPhase {
    Waiting,
    Playing,
    Completed(OpeningVerdict),
}

impl DrillPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Completed(_) => "completed",
        }
    }
}

/// One step of the book play replayed from the starting position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevealStep {
    pub mv: Move,
    pub position: PositionView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpeningDrillView {
    pub phase: &'static str,
    pub dice: [u8; 2],
    pub moves_remaining: Vec<u8>,
    pub position: PositionView,
    pub legal_moves: Vec<Move>,
    pub verdict: Option<OpeningVerdict>,
}

/// Opening-move practice: White plays a non-double roll from the starting
/// position and the result is checked against the book.
#[derive(Debug, Clone)]
pub struct OpeningDrill {
    roll: Option<Roll>,
    board: Board,
    remaining: Vec<u8>,
    played: Vec<Move>,
    phase: DrillPhase,
}

impl OpeningDrill {
    pub fn new() -> Self {
        Self {
            roll: None,
            board: Board::new(),
            remaining: Vec::new(),
            played: Vec::new(),
            phase: DrillPhase::Waiting,
        }
    }

    pub fn phase(&self) -> &DrillPhase {
        &self.phase
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Rolls a new non-double opening and starts over.
    pub fn roll(&mut self, dice: &mut dyn DiceRoller) -> Roll {
        let roll = dice.roll_distinct();
        self.start_with(roll);
        self.roll.unwrap_or(roll)
    }

    /// Starts the drill with a given roll. Dice are shown lower first.
    pub fn start_with(&mut self, roll: Roll) {
        let [a, b] = roll.values;
        let sorted = Roll::new(a.min(b), a.max(b));
        self.roll = Some(sorted);
        self.restart(sorted);
    }

    /// Replays the same roll after a wrong answer.
    pub fn try_again(&mut self) -> Result<(), EngineError> {
        match (&self.phase, self.roll) {
            (DrillPhase::Completed(_), Some(roll)) => {
                self.restart(roll);
                Ok(())
            }
            (phase, _) => Err(EngineError::WrongPhase(phase.name())),
        }
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        if self.phase != DrillPhase::Playing {
            return Vec::new();
        }
        legal_moves(&self.board, Color::White, &self.remaining)
    }

    pub fn play(&mut self, from: Source, to: Target) -> Result<Move, EngineError> {
        self.ensure_playing()?;
        let mv = self
            .legal_moves()
            .into_iter()
            .filter(|mv| mv.from == from && mv.to == to)
            .min_by_key(|mv| mv.die)
            .ok_or(EngineError::IllegalMove(Move::new(from, to, 0)))?;
        self.apply(mv)
    }

    /// Click-to-move: the highest die playable from `from`.
    pub fn play_from(&mut self, from: Source) -> Result<Move, EngineError> {
        self.ensure_playing()?;
        let mv = self
            .legal_moves()
            .into_iter()
            .filter(|mv| mv.from == from)
            .max_by_key(|mv| mv.die)
            .ok_or(EngineError::NoMoveFrom(from))?;
        self.apply(mv)
    }

    pub fn verdict(&self) -> Option<&OpeningVerdict> {
        match &self.phase {
            DrillPhase::Completed(verdict) => Some(verdict),
            _ => None,
        }
    }

    /// The first book play as a list of steps with the position after each,
    /// for the host to animate. Only offered after a wrong answer.
    pub fn reveal(&self) -> Result<Vec<RevealStep>, EngineError> {
        let (Some(verdict), Some(roll)) = (self.verdict(), self.roll) else {
            return Err(EngineError::WrongPhase(self.phase.name()));
        };
        if verdict.is_correct {
            return Err(EngineError::WrongPhase(self.phase.name()));
        }
        let Some(best) = lookup(roll).first() else {
            return Ok(Vec::new());
        };

        let mut board = Board::new();
        let mut steps = Vec::new();
        for mv in best.moves() {
            board.apply(Color::White, mv)?;
            steps.push(RevealStep {
                mv,
                position: board.to_view(),
            });
        }
        Ok(steps)
    }

    pub fn view(&self) -> OpeningDrillView {
        OpeningDrillView {
            phase: self.phase.name(),
            dice: self.roll.map(|roll| roll.values).unwrap_or([0, 0]),
            moves_remaining: self.remaining.clone(),
            position: self.board.to_view(),
            legal_moves: self.legal_moves(),
            verdict: self.verdict().cloned(),
        }
    }

    fn restart(&mut self, roll: Roll) {
        self.board = Board::new();
        self.remaining = roll.moves();
        self.played.clear();
        self.phase = DrillPhase::Playing;
    }

    fn ensure_playing(&self) -> Result<(), EngineError> {
        if self.phase == DrillPhase::Playing {
            Ok(())
        } else {
            Err(EngineError::WrongPhase(self.phase.name()))
        }
    }

    fn apply(&mut self, mv: Move) -> Result<Move, EngineError> {
        self.board.apply(Color::White, mv)?;
        if let Some(idx) = self.remaining.iter().position(|&die| die == mv.die) {
            self.remaining.remove(idx);
        }
        self.played.push(mv);

        if self.legal_moves().is_empty() {
            self.complete();
        }
        Ok(mv)
    }

    fn complete(&mut self) {
        let Some(roll) = self.roll else {
            return;
        };
        let matched = matching_play(roll, &self.board);
        let mut notations: Vec<String> = self.played.iter().map(Move::to_string).collect();
        notations.sort();

        self.phase = DrillPhase::Completed(OpeningVerdict {
            is_correct: matched.is_some(),
            matched,
            player_moves: notations.join(" "),
            book: lookup(roll),
        });
    }
}

impl Default for OpeningDrill {
    fn default() -> Self {
        Self::new()
    }
}
