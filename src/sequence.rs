use std::collections::{HashSet, VecDeque};

use crate::board::{Board, Move};
use crate::movegen::legal_moves;
use crate::types::Color;

/// A full-turn (or forced partial) sequence together with the position it
/// produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSequence {
    pub moves: Vec<Move>,
    pub result: Board,
}

impl MoveSequence {
    /// Dice actually consumed by the sequence.
    pub fn dice_used(&self) -> usize {
        self.moves.len()
    }
}

struct Node {
    board: Board,
    dice: Vec<u8>,
    path: Vec<Move>,
}

/// Enumerates every way `color` can play `dice` from `board`, keeping only the
/// sequences that use the most dice. Sequences reaching the same position are
/// reported once, first in enumeration order.
///
/// With two different dice of which only one can be played, the higher die
/// must be played when it can be. A position with no legal move yields a
/// single empty sequence.
pub fn enumerate(board: &Board, color: Color, dice: &[u8]) -> Vec<MoveSequence> {
    let mut seen = HashSet::new();
    let mut sequences = maximal_leaves(board, color, dice);
    sequences.retain(|seq| seen.insert(seq.result));
    sequences
}

/// Moves that start at least one maximal sequence, in enumeration order.
/// These are the only single moves a player may make next.
pub fn playable_moves(board: &Board, color: Color, dice: &[u8]) -> Vec<Move> {
    let mut firsts: Vec<Move> = Vec::new();
    for seq in maximal_leaves(board, color, dice) {
        if let Some(&first) = seq.moves.first()
            && !firsts.contains(&first)
        {
            firsts.push(first);
        }
    }
    firsts
}

/// Maximal sequences, one per distinct first move and resulting position.
fn maximal_leaves(board: &Board, color: Color, dice: &[u8]) -> Vec<MoveSequence> {
    let mut leaves = Vec::new();
    // Nodes sharing a first move, a board and the dice left have the same
    // continuations; only the first one reached is expanded.
    let mut expanded: HashSet<(Option<Move>, Board, Vec<u8>)> = HashSet::new();
    let mut queue = VecDeque::from([Node {
        board: *board,
        dice: dice.to_vec(),
        path: Vec::new(),
    }]);

    while let Some(node) = queue.pop_front() {
        let moves = legal_moves(&node.board, color, &node.dice);
        if moves.is_empty() {
            leaves.push(MoveSequence {
                moves: node.path,
                result: node.board,
            });
            continue;
        }

        for mv in moves {
            let Some(die_idx) = node.dice.iter().position(|&die| die == mv.die) else {
                continue;
            };
            let Ok(next) = node.board.with_move(color, mv) else {
                continue;
            };
            let mut dice_left = node.dice.clone();
            dice_left.remove(die_idx);
            let first = node.path.first().copied().or(Some(mv));
            if !expanded.insert((first, next, dice_left.clone())) {
                continue;
            }
            let mut path = node.path.clone();
            path.push(mv);
            queue.push_back(Node {
                board: next,
                dice: dice_left,
                path,
            });
        }
    }

    let max_len = leaves.iter().map(MoveSequence::dice_used).max().unwrap_or(0);

    if dice.len() == 2 && dice[0] != dice[1] && max_len == 1 {
        let higher = dice[0].max(dice[1]);
        let plays_higher = |seq: &MoveSequence| seq.moves.len() == 1 && seq.moves[0].die == higher;
        if leaves.iter().any(plays_higher) {
            leaves.retain(plays_higher);
            return leaves;
        }
    }

    leaves.retain(|seq| seq.moves.len() == max_len);
    leaves
}
