use thiserror::Error;

use crate::board::{Move, Source};

/// Rejection of an engine command. A rejected command never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("illegal move {0}")]
    IllegalMove(Move),
    #[error("no legal move from {0}")]
    NoMoveFrom(Source),
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("invalid move endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("it is not the player's turn")]
    NotYourTurn,
    #[error("command not allowed during {0}")]
    WrongPhase(&'static str),
    #[error("doubling is not allowed now")]
    DoubleNotAllowed,
    #[error("there is no move to undo")]
    NothingToUndo,
    #[error("the turn still has playable dice")]
    TurnNotFinished,
}
