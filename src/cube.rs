use serde::Serialize;

use crate::config::AiConfig;
use crate::types::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CubeOwner {
    Center,
    White,
    Black,
}

impl From<Color> for CubeOwner {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Self::White,
            Color::Black => Self::Black,
        }
    }
}

/// Doubling cube. Whether a double is currently on offer is part of the turn
/// stage, not of the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cube {
    value: u32,
    owner: CubeOwner,
}

impl Cube {
    pub fn new() -> Self {
        Self {
            value: 1,
            owner: CubeOwner::Center,
        }
    }

    pub fn with_state(value: u32, owner: CubeOwner) -> Self {
        Self { value, owner }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn owner(&self) -> CubeOwner {
        self.owner
    }

    /// `side` holds access to the cube and it is below the cap.
    pub fn available_to(&self, side: Color, max_cube: u32) -> bool {
        let owned = self.owner == CubeOwner::Center || self.owner == CubeOwner::from(side);
        owned && self.value < max_cube
    }

    /// Accepted double: value doubles and the taker owns the cube.
    pub fn take(&mut self, taker: Color) {
        self.value *= 2;
        self.owner = CubeOwner::from(taker);
    }
}

impl Default for Cube {
    fn default() -> Self {
        Self::new()
    }
}

/// The doubler leads the race by more than the configured margin and the
/// cube can still go up.
pub fn should_offer_double(own_pips: u16, opponent_pips: u16, cube: &Cube, ai: &AiConfig) -> bool {
    own_pips as i32 + (ai.double_margin as i32) < opponent_pips as i32 && cube.value() < ai.max_cube
}

/// Takes unless trailing the doubler by more than the resign margin.
pub fn should_take_double(own_pips: u16, doubler_pips: u16, ai: &AiConfig) -> bool {
    (own_pips as i32 - doubler_pips as i32) <= ai.resign_margin as i32
}
