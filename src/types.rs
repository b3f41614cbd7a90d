use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::board::Move;
use crate::cube::CubeOwner;
use crate::game::Continuation;
use crate::matchplay::{CrawfordStatus, GameOutcome};

/// Checker color. White is the human side and moves from 24 down to 1;
/// black moves from 1 up to 24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Points making up this color's home board.
    pub fn home_range(self) -> RangeInclusive<u8> {
        match self {
            Self::White => 1..=6,
            Self::Black => 19..=24,
        }
    }

    /// Pips a checker on `point` still has to travel to leave the board.
    pub fn distance(self, point: u8) -> u8 {
        match self {
            Self::White => point,
            Self::Black => 25 - point,
        }
    }

    /// Point a checker on the bar enters on with `die`.
    pub fn entry_point(self, die: u8) -> u8 {
        match self {
            Self::White => 25 - die,
            Self::Black => die,
        }
    }

    /// Destination of moving from `point` by `die`, or `None` when the move
    /// runs past the edge of the board.
    pub fn advance(self, point: u8, die: u8) -> Option<u8> {
        let target = match self {
            Self::White => point as i16 - die as i16,
            Self::Black => point as i16 + die as i16,
        };
        (1..=24).contains(&target).then_some(target as u8)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
        }
    }
}

/// A pair of per-color checker counters (bar, borne off).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideCounts {
    pub white: u8,
    pub black: u8,
}

impl SideCounts {
    pub fn get(&self, color: Color) -> u8 {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn get_mut(&mut self, color: Color) -> &mut u8 {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointView {
    pub color: Color,
    pub count: u8,
}

/// Serializable position exchanged with the presentation layer.
/// Empty points are absent from `points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionView {
    pub points: BTreeMap<u8, PointView>,
    pub bar: SideCounts,
    pub born_off: SideCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipCounts {
    pub white: u16,
    pub black: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CubeView {
    pub value: u32,
    pub owner: CubeOwner,
    pub offered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreView {
    pub target_score: u32,
    pub player_score: u32,
    pub computer_score: u32,
    pub crawford: Option<CrawfordStatus>,
    pub match_winner: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockView {
    pub player_seconds: u32,
    pub computer_seconds: u32,
    pub grace_seconds: u32,
}

/// Public game state returned from WASM APIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameStateView {
    /// One of `pre-match`, `opening`, `playing`, `ended`.
    pub phase: &'static str,
    pub current_player: Option<Color>,
    /// `[0, 0]` until the side to move has rolled.
    pub dice: [u8; 2],
    pub moves_remaining: Vec<u8>,
    pub position: PositionView,
    pub pips: PipCounts,
    pub cube: CubeView,
    pub can_double: bool,
    /// Contract:
    /// - Human turn after the roll: every move the engine will accept.
    /// - Otherwise: empty.
    pub legal_moves: Vec<Move>,
    pub can_undo: bool,
    pub outcome: Option<GameOutcome>,
    pub score: ScoreView,
    pub clock: Option<ClockView>,
    pub pending: Option<Continuation>,
    pub log: Vec<String>,
}

/// Result of a command issued through the WASM surface. Rejected commands
/// carry the reason and the unchanged state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome<S = GameStateView> {
    pub accepted: bool,
    pub reason: Option<String>,
    pub state: S,
}

impl<S> CommandOutcome<S> {
    pub fn from_result<T, E: fmt::Display>(result: Result<T, E>, state: S) -> Self {
        Self {
            accepted: result.is_ok(),
            reason: result.err().map(|err| err.to_string()),
            state,
        }
    }
}
