use serde::{Deserialize, Serialize};

use crate::board::{Board, Color, Piece};
use crate::config::GameConfig;
use crate::error::EngineError;
use crate::game::Game;
use crate::movegen::Move;

/// Serializable picture of a game, enough to resume play including en
/// passant and castling rights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub board: [[Option<Piece>; 8]; 8],
    pub turn: Color,
    pub last_move: Option<Move>,
    #[serde(default)]
    pub move_history: Vec<Move>,
    /// Pieces taken by White and by Black. Rebuilt from `move_history` when
    /// absent, which misses captures made in evicted moves.
    #[serde(default)]
    pub captured: Option<[Vec<Piece>; 2]>,
}

impl GameSnapshot {
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::InvalidSnapshot(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text).map_err(|e| EngineError::InvalidSnapshot(e.to_string()))
    }
}

impl Game {
    pub fn to_snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            board: *self.board().grid(),
            turn: self.turn(),
            last_move: self.last_move(),
            move_history: self.history().copied().collect(),
            captured: Some([
                self.captured_by(Color::White).to_vec(),
                self.captured_by(Color::Black).to_vec(),
            ]),
        }
    }

    /// Resumes a game. A pending promotion is not part of the snapshot.
    pub fn from_snapshot(snapshot: GameSnapshot, config: GameConfig) -> Result<Game, EngineError> {
        check_history(&snapshot)
            .and_then(|()| {
                let board = Board::from_grid(snapshot.board, snapshot.turn, snapshot.last_move);
                Game::rehydrate(board, snapshot.move_history, snapshot.captured, config)
            })
            .map_err(|e| {
                log::warn!("rejected snapshot: {}", e);
                e
            })
    }
}

fn check_history(snapshot: &GameSnapshot) -> Result<(), EngineError> {
    if snapshot
        .last_move
        .iter()
        .chain(&snapshot.move_history)
        .any(|mv| !mv.from.is_on_board() || !mv.to.is_on_board())
    {
        return Err(EngineError::InvalidSnapshot("move square off the board".into()));
    }
    if let Some(last) = snapshot.last_move {
        let landed = snapshot.board[last.to.row as usize][last.to.col as usize];
        let kind = last.promotion.unwrap_or(last.piece.kind);
        if !matches!(landed, Some(p) if p.color == last.piece.color && p.kind == kind) {
            return Err(EngineError::InvalidSnapshot(format!(
                "last move {} does not match the board",
                last
            )));
        }
    }
    if let Some(latest) = snapshot.move_history.last() {
        if snapshot.last_move != Some(*latest) {
            return Err(EngineError::InvalidSnapshot(
                "last move does not match the end of the history".into(),
            ));
        }
        if latest.piece.color == snapshot.turn {
            return Err(EngineError::InvalidSnapshot(format!(
                "{} moved last but is also to move",
                snapshot.turn
            )));
        }
    }
    if snapshot
        .move_history
        .windows(2)
        .any(|pair| pair[0].piece.color == pair[1].piece.color)
    {
        return Err(EngineError::InvalidSnapshot(
            "history does not alternate colors".into(),
        ));
    }

    Ok(())
}
