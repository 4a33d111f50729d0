use std::collections::VecDeque;

use crate::board::{Board, Color, Piece, PieceKind, Square, Undo};
use crate::config::GameConfig;
use crate::error::{EngineError, InvalidMove};
use crate::evaluation::GamePhase;
use crate::movegen::{Move, MoveGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InProgress,
    Checkmate { winner: Color },
    Stalemate,
}

/// Outcome of a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Ok(Move),
    Checkmate(Move),
    Stalemate(Move),
    /// A pawn reached the last rank; call [`Game::complete_promotion`].
    PromotionPending(Square),
    Invalid(InvalidMove),
}

impl MoveResult {
    /// The move that was played, if one was.
    pub fn applied(&self) -> Option<&Move> {
        match self {
            MoveResult::Ok(mv) | MoveResult::Checkmate(mv) | MoveResult::Stalemate(mv) => Some(mv),
            MoveResult::PromotionPending(_) | MoveResult::Invalid(_) => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, MoveResult::Invalid(_))
    }
}

/// Splits coordinate notation such as `e2e4` or `e7e8q`.
pub fn parse_coordinate(text: &str) -> Option<(Square, Square, Option<PieceKind>)> {
    let text = text.trim();
    if !text.is_ascii() || !(4..=5).contains(&text.len()) {
        return None;
    }
    let from = Square::from_algebraic(&text[0..2])?;
    let to = Square::from_algebraic(&text[2..4])?;
    let promotion = match text[4..].chars().next() {
        None => None,
        Some('q') => Some(PieceKind::Queen),
        Some('r') => Some(PieceKind::Rook),
        Some('b') => Some(PieceKind::Bishop),
        Some('n') => Some(PieceKind::Knight),
        Some(_) => return None,
    };
    Some((from, to, promotion))
}

/// Authoritative game session: owns the board, the undo history and the
/// derived check and terminal flags.
pub struct Game {
    board: Board,
    history: VecDeque<Undo>,
    /// Pieces taken by each color, indexed by the capturer.
    captured: [Vec<Piece>; 2],
    in_check: bool,
    status: GameStatus,
    pending_promotion: Option<Move>,
    config: GameConfig,
    generator: MoveGenerator,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let mut game = Self {
            board: Board::new(),
            history: VecDeque::new(),
            captured: [Vec::new(), Vec::new()],
            in_check: false,
            status: GameStatus::InProgress,
            pending_promotion: None,
            config,
            generator: MoveGenerator::new(),
        };
        game.refresh();
        game
    }

    /// Starts from an arbitrary position, rejecting ones that legal play
    /// cannot produce.
    pub fn from_board(board: Board, config: GameConfig) -> Result<Self, EngineError> {
        board.validate()?;
        let waiting = board.side_to_move.opposite();
        if MoveGenerator::new().is_in_check(&board, waiting) {
            return Err(EngineError::KingCapturable(waiting));
        }
        let mut game = Self::with_config(config);
        game.board = board;
        game.refresh();
        Ok(game)
    }

    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        Self::from_board(Board::from_fen(fen)?, GameConfig::default())
    }

    /// Rebuilds a session whose board already reflects `moves`. Without an
    /// explicit capture ledger it is rebuilt from the captures in `moves`.
    ///
    /// The move before the first entry is unknown, so undoing that entry
    /// leaves no last move behind, even when older moves were evicted.
    pub(crate) fn rehydrate(
        board: Board,
        moves: Vec<Move>,
        captured: Option<[Vec<Piece>; 2]>,
        config: GameConfig,
    ) -> Result<Self, EngineError> {
        let mut game = Self::from_board(board, config)?;
        let rebuild = captured.is_none();
        if let Some(captured) = captured {
            game.captured = captured;
        }
        let mut previous = None;
        for mv in moves {
            if let (true, Some(piece)) = (rebuild, mv.captured) {
                game.captured[mv.piece.color.index()].push(piece);
            }
            game.history.push_back(Undo::restore(mv, previous));
            previous = Some(mv);
        }
        while game.history.len() > game.config.history_limit {
            game.history.pop_front();
        }
        Ok(game)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Color {
        self.board.side_to_move
    }

    pub fn is_check(&self) -> bool {
        self.in_check
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_over(&self) -> bool {
        self.status != GameStatus::InProgress
    }

    pub fn winner(&self) -> Option<Color> {
        match self.status {
            GameStatus::Checkmate { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn captured_by(&self, color: Color) -> &[Piece] {
        &self.captured[color.index()]
    }

    pub fn history(&self) -> impl Iterator<Item = &Move> + '_ {
        self.history.iter().map(Undo::mv)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_move(&self) -> Option<Move> {
        self.board.last_move
    }

    pub fn pending_promotion(&self) -> Option<Move> {
        self.pending_promotion
    }

    pub fn phase(&self) -> GamePhase {
        GamePhase::of(&self.board)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Legal moves for the side to move; none while a promotion is pending or
    /// once the game has ended.
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.pending_promotion.is_some() || self.is_over() {
            return Vec::new();
        }
        self.generator.legal_moves(&self.board)
    }

    pub fn legal_moves_from(&self, from: Square) -> Vec<Move> {
        match self.board.piece_at(from) {
            Some(piece) if piece.color == self.turn() && self.pending_promotion.is_none() => {
                self.generator.legal_moves_from(&self.board, from)
            }
            _ => Vec::new(),
        }
    }

    pub fn apply_move(&mut self, from: Square, to: Square, promotion: Option<PieceKind>) -> MoveResult {
        if self.pending_promotion.is_some() {
            return MoveResult::Invalid(InvalidMove::PromotionPending);
        }
        if self.is_over() {
            return MoveResult::Invalid(InvalidMove::GameOver);
        }
        let Some(piece) = self.board.piece_at(from) else {
            return MoveResult::Invalid(InvalidMove::EmptyOrigin(from));
        };
        if piece.color != self.turn() {
            return MoveResult::Invalid(InvalidMove::WrongSide(from));
        }

        let candidates: Vec<Move> = self
            .generator
            .legal_moves_from(&self.board, from)
            .into_iter()
            .filter(|mv| mv.to == to)
            .collect();
        let Some(&first) = candidates.first() else {
            return MoveResult::Invalid(InvalidMove::IllegalDestination { from, to });
        };

        if first.promotion.is_none() {
            return self.commit(first);
        }
        match promotion {
            Some(kind) if !kind.is_promotion_target() => {
                MoveResult::Invalid(InvalidMove::InvalidPromotionPiece(kind))
            }
            Some(kind) => match candidates.iter().find(|mv| mv.promotion == Some(kind)) {
                Some(&mv) => self.commit(mv),
                None => MoveResult::Invalid(InvalidMove::InvalidPromotionPiece(kind)),
            },
            None => {
                self.pending_promotion = Some(Move {
                    promotion: None,
                    ..first
                });
                log::debug!("promotion pending on {}", to);
                MoveResult::PromotionPending(to)
            }
        }
    }

    /// Convenience wrapper over [`Game::apply_move`] for coordinate notation.
    /// `None` if the text does not parse.
    pub fn apply_coordinate(&mut self, text: &str) -> Option<MoveResult> {
        let (from, to, promotion) = parse_coordinate(text)?;
        Some(self.apply_move(from, to, promotion))
    }

    pub fn complete_promotion(&mut self, kind: PieceKind) -> MoveResult {
        let Some(pending) = self.pending_promotion else {
            return MoveResult::Invalid(InvalidMove::NoPromotionPending);
        };
        if !kind.is_promotion_target() {
            return MoveResult::Invalid(InvalidMove::InvalidPromotionPiece(kind));
        }
        self.pending_promotion = None;
        self.commit(Move {
            promotion: Some(kind),
            ..pending
        })
    }

    /// Takes back the latest move, or cancels a pending promotion. Returns
    /// `None` when there is nothing to undo.
    pub fn undo_move(&mut self) -> Option<Move> {
        if let Some(pending) = self.pending_promotion.take() {
            log::debug!("cancelled promotion on {}", pending.to);
            return Some(pending);
        }
        let undo = self.history.pop_back()?;
        let mv = *undo.mv();
        self.board.unmake_move(undo);
        log::debug!("took back {}", mv);
        if mv.captured.is_some() {
            self.captured[mv.piece.color.index()].pop();
        }
        self.refresh();
        Some(mv)
    }

    fn commit(&mut self, mv: Move) -> MoveResult {
        let undo = self.board.make_move(mv);
        if let Some(piece) = mv.captured {
            self.captured[mv.piece.color.index()].push(piece);
        }
        self.history.push_back(undo);
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
        self.refresh();
        log::debug!("{} played {}", mv.piece.color, mv);

        match self.status {
            GameStatus::InProgress => MoveResult::Ok(mv),
            GameStatus::Checkmate { winner } => {
                log::info!("checkmate, {} wins", winner);
                MoveResult::Checkmate(mv)
            }
            GameStatus::Stalemate => {
                log::info!("stalemate after {}", mv);
                MoveResult::Stalemate(mv)
            }
        }
    }

    fn refresh(&mut self) {
        let side = self.board.side_to_move;
        self.in_check = self.generator.is_in_check(&self.board, side);
        self.status = if self.generator.has_legal_move(&self.board, side) {
            GameStatus::InProgress
        } else if self.in_check {
            GameStatus::Checkmate {
                winner: side.opposite(),
            }
        } else {
            GameStatus::Stalemate
        };
    }
}
