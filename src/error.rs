use thiserror::Error;

use crate::board::{Color, PieceKind, Square};

/// Structural problems with a position. These indicate a broken snapshot or a
/// programming error, never a bad player move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no {0} king on the board")]
    MissingKing(Color),

    #[error("more than one {0} king on the board")]
    ExtraKing(Color),

    #[error("{0} king can be captured by the side to move")]
    KingCapturable(Color),

    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Why a move request was rejected. The game is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidMove {
    #[error("the game is over")]
    GameOver,

    #[error("a promotion choice is pending")]
    PromotionPending,

    #[error("no promotion is pending")]
    NoPromotionPending,

    #[error("no piece on {0}")]
    EmptyOrigin(Square),

    #[error("the piece on {0} does not belong to the side to move")]
    WrongSide(Square),

    #[error("{from}{to} is not a legal move")]
    IllegalDestination { from: Square, to: Square },

    #[error("cannot promote to {0:?}")]
    InvalidPromotionPiece(PieceKind),
}
