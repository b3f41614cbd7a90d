use thiserror::Error;

use crate::board::{Board, CHECKERS_PER_SIDE, NUM_POINTS};
use crate::types::Color;

const MAGIC: &[u8; 4] = b"BGEV";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 20;
const SCALARS: usize = 7;
const VALUE_COUNT: usize = SCALARS + NUM_POINTS as usize;

/// Made-point bonus by point number as seen from the mover (1 = deepest home
/// point, 24 = opponent's home edge). The 5-point and bar-point weigh most.
const POINT_VALUES: [f32; NUM_POINTS as usize] = [
    2.0, 2.0, 3.0, 4.0, 6.0, 3.0, 5.0, 2.0, 1.0, 1.0, 1.0, 1.0, //
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeightsError {
    #[error("weights data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("invalid weights magic (expected BGEV)")]
    Magic,
    #[error("unsupported weights version: expected 1, got {0}")]
    Version(u32),
    #[error("CRC32 mismatch: expected {expected:#010x}, got {actual:#010x}")]
    Crc { expected: u32, actual: u32 },
    #[error("unexpected value count: expected 31, got {0}")]
    Count(u32),
    #[error("unexpected EOF while reading weight #{0}")]
    Eof(usize),
    #[error("weights payload has trailing bytes")]
    TrailingBytes,
}

/// Coefficients of the position heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalWeights {
    pub race: f32,
    pub own_blot: f32,
    pub opponent_blot: f32,
    pub own_bar: f32,
    pub opponent_bar: f32,
    pub borne_off: f32,
    pub home_borne_off: f32,
    pub point_values: [f32; NUM_POINTS as usize],
}

impl Default for EvalWeights {
    fn default() -> Self {
        Self {
            race: 1.5,
            own_blot: 5.0,
            opponent_blot: 10.0,
            own_bar: 25.0,
            opponent_bar: 15.0,
            borne_off: 200.0,
            home_borne_off: 50.0,
            point_values: POINT_VALUES,
        }
    }
}

impl EvalWeights {
    /// Deserialize a weight profile.
    ///
    /// Layout: 20-byte header (magic, version, value count, CRC32 of the
    /// payload, reserved), then little-endian `f32` values: the seven scalar
    /// coefficients in field order followed by the 24 point values.
    pub fn from_bytes(data: &[u8]) -> Result<Self, WeightsError> {
        if data.len() < HEADER_SIZE {
            return Err(WeightsError::TooShort {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        if &data[0..4] != MAGIC {
            return Err(WeightsError::Magic);
        }

        let version = read_u32_le(data, 4)?;
        if version != VERSION {
            return Err(WeightsError::Version(version));
        }

        let count = read_u32_le(data, 8)?;
        if count as usize != VALUE_COUNT {
            return Err(WeightsError::Count(count));
        }

        let expected = read_u32_le(data, 12)?;
        let payload = &data[HEADER_SIZE..];
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(WeightsError::Crc { expected, actual });
        }

        let mut values = [0.0f32; VALUE_COUNT];
        for (idx, value) in values.iter_mut().enumerate() {
            *value = read_f32_le(payload, idx * 4).map_err(|_| WeightsError::Eof(idx))?;
        }
        if payload.len() != VALUE_COUNT * 4 {
            return Err(WeightsError::TrailingBytes);
        }

        let mut point_values = [0.0f32; NUM_POINTS as usize];
        point_values.copy_from_slice(&values[SCALARS..]);

        Ok(Self {
            race: values[0],
            own_blot: values[1],
            opponent_blot: values[2],
            own_bar: values[3],
            opponent_bar: values[4],
            borne_off: values[5],
            home_borne_off: values[6],
            point_values,
        })
    }
}

/// Static position evaluator used to rank candidate sequences.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    weights: EvalWeights,
}

impl Evaluator {
    pub fn new(weights: EvalWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &EvalWeights {
        &self.weights
    }

    /// Evaluate from `color`'s perspective. A finished bear-off is decisive.
    pub fn evaluate(&self, board: &Board, color: Color) -> f32 {
        let opponent = color.opponent();
        if board.borne_off(color) == CHECKERS_PER_SIDE {
            return f32::INFINITY;
        }
        if board.borne_off(opponent) == CHECKERS_PER_SIDE {
            return f32::NEG_INFINITY;
        }

        let w = &self.weights;
        let own_pips = board.pip_count(color) as f32;
        let opponent_pips = board.pip_count(opponent) as f32;
        let mut score = w.race * (opponent_pips - own_pips);

        for point in 1..=NUM_POINTS {
            match board.count(color, point) {
                0 => {}
                1 => score -= w.own_blot,
                _ => score += w.point_values[(color.distance(point) - 1) as usize],
            }
            if board.count(opponent, point) == 1 {
                score += w.opponent_blot;
            }
        }

        score -= w.own_bar * board.bar(color) as f32;
        score += w.opponent_bar * board.bar(opponent) as f32;

        let off = board.borne_off(color) as f32;
        score += w.borne_off * off;
        if board.all_home(color) {
            score += w.home_borne_off * off;
        }

        score
    }
}

fn read_u32_le(data: &[u8], offset: usize) -> Result<u32, WeightsError> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(WeightsError::TooShort {
            expected: offset + 4,
            actual: data.len(),
        })?;
    let mut chunk = [0u8; 4];
    chunk.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(chunk))
}

fn read_f32_le(data: &[u8], offset: usize) -> Result<f32, WeightsError> {
    read_u32_le(data, offset).map(f32::from_bits)
}
