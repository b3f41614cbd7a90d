use serde::Deserialize;
use thiserror::Error;

const MATCH_LENGTHS: [u32; 5] = [1, 3, 5, 7, 9];
const MAX_SECONDS_PER_POINT: u32 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported match length {0} (expected one of 1, 3, 5, 7, 9)")]
    MatchLength(u32),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("max_cube must be a power of two, got {0}")]
    CubeCap(u32),
    #[error("seconds_per_point {0} exceeds one hour")]
    ClockTooLong(u32),
}

/// Computer opponent tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Offer a double when leading the race by more than this many pips.
    pub double_margin: u16,
    /// Drop a double when trailing the race by more than this many pips.
    pub resign_margin: u16,
    pub max_cube: u32,
    pub search_timeout_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            double_margin: 8,
            resign_margin: 25,
            max_cube: 64,
            search_timeout_ms: 2000,
        }
    }
}

/// Delays, in milliseconds, attached to scheduled continuations. They pace
/// the presentation only; the engine never waits on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub auto_pass: u32,
    pub computer_think: u32,
    pub computer_step: u32,
    pub double_response: u32,
    pub post_take_roll: u32,
    pub next_game: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            auto_pass: 1000,
            computer_think: 1200,
            computer_step: 800,
            double_response: 1500,
            post_take_roll: 1500,
            next_game: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub target_score: u32,
    pub use_clock: bool,
    pub seconds_per_point: u32,
    pub grace_seconds: u32,
    pub ai: AiConfig,
    pub pacing: PacingConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            target_score: 1,
            use_clock: false,
            seconds_per_point: 120,
            grace_seconds: 12,
            ai: AiConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !MATCH_LENGTHS.contains(&self.target_score) {
            return Err(ConfigError::MatchLength(self.target_score));
        }
        if self.use_clock && self.seconds_per_point == 0 {
            return Err(ConfigError::Zero("seconds_per_point"));
        }
        if self.seconds_per_point > MAX_SECONDS_PER_POINT {
            return Err(ConfigError::ClockTooLong(self.seconds_per_point));
        }
        if !self.ai.max_cube.is_power_of_two() {
            return Err(ConfigError::CubeCap(self.ai.max_cube));
        }
        Ok(())
    }

    /// Starting clock for each side.
    pub fn clock_seconds(&self) -> u32 {
        self.target_score.saturating_mul(self.seconds_per_point)
    }
}
