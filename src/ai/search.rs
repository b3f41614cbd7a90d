use std::time::Duration;

use web_time::Instant;

use crate::ai::eval::Evaluator;
use crate::board::Board;
use crate::game::SequenceSelector;
use crate::sequence::{MoveSequence, enumerate};
use crate::types::Color;

const DEFAULT_TIMEOUT_MS: u64 = 2000;

pub struct Searcher<'a> {
    evaluator: &'a Evaluator,
    start_time: Instant,
    timeout: Duration,
    timed_out: bool,
}

impl<'a> Searcher<'a> {
    pub fn new(evaluator: &'a Evaluator) -> Self {
        Self::with_timeout(evaluator, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    pub fn with_timeout(evaluator: &'a Evaluator, timeout: Duration) -> Self {
        Self {
            evaluator,
            start_time: Instant::now(),
            timeout,
            timed_out: false,
        }
    }

    /// Picks the maximal sequence whose resulting position scores highest for
    /// `color`. Ties keep the earliest candidate in enumeration order.
    ///
    /// Always returns a sequence; it is empty when no move can be played.
    pub fn search(&mut self, board: &Board, color: Color, dice: &[u8]) -> MoveSequence {
        self.start_time = Instant::now();
        self.timed_out = false;

        let mut candidates = enumerate(board, color, dice).into_iter();
        let Some(first) = candidates.next() else {
            return MoveSequence {
                moves: Vec::new(),
                result: *board,
            };
        };

        let mut best_score = self.evaluator.evaluate(&first.result, color);
        let mut best = first;

        for candidate in candidates {
            if self.start_time.elapsed() >= self.timeout {
                self.timed_out = true;
                break;
            }
            let score = self.evaluator.evaluate(&candidate.result, color);
            if is_better(score, best_score) {
                best_score = score;
                best = candidate;
            }
        }

        best
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }
}

fn is_better(score: f32, best_score: f32) -> bool {
    score > best_score
}

/// Computer opponent backed by the heuristic evaluator.
#[derive(Debug, Clone, Default)]
pub struct HeuristicSelector {
    evaluator: Evaluator,
    timeout: Option<Duration>,
}

impl HeuristicSelector {
    pub fn new(evaluator: Evaluator, timeout: Duration) -> Self {
        Self {
            evaluator,
            timeout: Some(timeout),
        }
    }
}

impl SequenceSelector for HeuristicSelector {
    fn select_sequence(&self, board: &Board, color: Color, dice: &[u8]) -> MoveSequence {
        let mut searcher = match self.timeout {
            Some(timeout) => Searcher::with_timeout(&self.evaluator, timeout),
            None => Searcher::new(&self.evaluator),
        };
        let seq = searcher.search(board, color, dice);
        if searcher.timed_out() {
            tracing::debug!(%color, "sequence search hit its time budget");
        }
        seq
    }
}
