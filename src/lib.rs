pub mod error;
pub mod board;
pub mod movegen;
pub mod config;
pub mod cache;
pub mod evaluation;
pub mod search;
pub mod game;
pub mod snapshot;
pub mod ai;

pub use ai::{AiController, Difficulty};
pub use board::{Board, Color, Piece, PieceKind, Square};
pub use config::{GameConfig, SearchLimits, StyleWeights};
pub use error::{EngineError, InvalidMove};
pub use game::{Game, GameStatus, MoveResult};
pub use movegen::{Move, MoveGenerator};
pub use search::{ScoredMove, Search, SearchResult};
pub use snapshot::GameSnapshot;
