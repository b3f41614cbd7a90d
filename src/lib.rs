use wasm_bindgen::prelude::*;

pub mod ai;
pub mod api;
pub mod board;
pub mod config;
pub mod cube;
pub mod dice;
pub mod error;
pub mod game;
pub mod matchplay;
pub mod movegen;
pub mod opening;
pub mod pipdrill;
pub mod sequence;
pub mod types;

pub use board::{Board, Move, Source, Target};
pub use config::MatchConfig;
pub use error::EngineError;
pub use game::Engine;
pub use types::Color;

#[wasm_bindgen]
pub fn wasm_ready() -> bool {
    true
}
