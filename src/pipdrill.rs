use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::board::{Board, CHECKERS_PER_SIDE, NUM_POINTS};
use crate::error::EngineError;
use crate::types::{Color, PositionView, SideCounts};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

struct Layout {
    min_points: usize,
    max_points: usize,
    max_per_point: u8,
}

impl Difficulty {
    fn layout(self) -> Layout {
        match self {
            Self::Beginner => Layout {
                min_points: 3,
                max_points: 6,
                max_per_point: 3,
            },
            Self::Intermediate => Layout {
                min_points: 4,
                max_points: 8,
                max_per_point: 4,
            },
            Self::Advanced => Layout {
                min_points: 6,
                max_points: 12,
                max_per_point: 5,
            },
        }
    }
}

/// Fifteen White checkers spread over random points. Harder levels use more
/// points and taller stacks.
pub fn random_position<R: Rng + ?Sized>(
    difficulty: Difficulty,
    rng: &mut R,
) -> Result<Board, EngineError> {
    let layout = difficulty.layout();
    let mut counts = [0u8; NUM_POINTS as usize + 1];
    let mut left = CHECKERS_PER_SIDE;

    let mut points: Vec<u8> = (1..=NUM_POINTS).collect();
    points.shuffle(rng);
    let spread = rng.gen_range(layout.min_points..=layout.max_points);
    for &point in points.iter().take(spread) {
        if left == 0 {
            break;
        }
        let stack = rng.gen_range(1..=layout.max_per_point).min(left);
        counts[point as usize] = stack;
        left -= stack;
    }

    while left > 0 {
        let point = rng.gen_range(1..=NUM_POINTS) as usize;
        let room = layout.max_per_point - counts[point];
        if room == 0 {
            continue;
        }
        let stack = if counts[point] == 0 {
            rng.gen_range(1..=layout.max_per_point)
        } else {
            room
        };
        let stack = stack.min(left);
        counts[point] += stack;
        left -= stack;
    }

    let placed: Vec<(u8, Color, u8)> = (1..=NUM_POINTS)
        .filter(|&point| counts[point as usize] > 0)
        .map(|point| (point, Color::White, counts[point as usize]))
        .collect();
    Board::from_points(&placed, SideCounts::default(), SideCounts::default())
}

/// Result of one answered drill, in the shape the host persists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillRecord {
    pub position: PositionView,
    pub correct_pip_count: u16,
    pub user_answer: u16,
    pub time_taken_seconds: u64,
    pub is_correct: bool,
    pub difficulty: Difficulty,
}

/// One pip-counting question.
#[derive(Debug, Clone)]
pub struct PipDrill {
    difficulty: Difficulty,
    board: Board,
    correct: u16,
    started: Instant,
    answered: bool,
}

impl PipDrill {
    pub fn new<R: Rng + ?Sized>(difficulty: Difficulty, rng: &mut R) -> Result<Self, EngineError> {
        let board = random_position(difficulty, rng)?;
        Ok(Self {
            difficulty,
            board,
            correct: board.pip_count(Color::White),
            started: Instant::now(),
            answered: false,
        })
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn position(&self) -> PositionView {
        self.board.to_view()
    }

    pub fn submit(&mut self, answer: u16) -> Result<DrillRecord, EngineError> {
        let elapsed = self.started.elapsed();
        self.submit_after(answer, elapsed)
    }

    /// Answers the question; each drill takes exactly one answer.
    pub fn submit_after(
        &mut self,
        answer: u16,
        elapsed: Duration,
    ) -> Result<DrillRecord, EngineError> {
        if self.answered {
            return Err(EngineError::WrongPhase("answered"));
        }
        self.answered = true;

        Ok(DrillRecord {
            position: self.board.to_view(),
            correct_pip_count: self.correct,
            user_answer: answer,
            time_taken_seconds: elapsed.as_secs(),
            is_correct: answer == self.correct,
            difficulty: self.difficulty,
        })
    }
}

/// Running totals over a practice session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total: u32,
    pub correct: u32,
    pub total_seconds: u64,
    /// Rounded mean seconds per answer.
    pub average_seconds: u64,
    /// Rounded percentage of correct answers.
    pub accuracy: u32,
}

impl SessionStats {
    pub fn record(&mut self, record: &DrillRecord) {
        self.total += 1;
        if record.is_correct {
            self.correct += 1;
        }
        self.total_seconds += record.time_taken_seconds;

        let total = self.total as u64;
        self.average_seconds = (self.total_seconds * 2 + total) / (total * 2);
        self.accuracy = (self.correct * 200 + self.total) / (self.total * 2);
    }
}
