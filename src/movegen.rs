use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::{Board, Color, Piece, PieceKind, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastleSide {
    King,
    Queen,
}

impl CastleSide {
    pub fn rook_col(self) -> u8 {
        match self {
            CastleSide::King => 7,
            CastleSide::Queen => 0,
        }
    }

    pub fn rook_target_col(self) -> u8 {
        match self {
            CastleSide::King => 5,
            CastleSide::Queen => 3,
        }
    }

    pub fn king_target_col(self) -> u8 {
        match self {
            CastleSide::King => 6,
            CastleSide::Queen => 2,
        }
    }

    /// Columns between king and rook that must be empty.
    fn between_cols(self) -> &'static [u8] {
        match self {
            CastleSide::King => &[5, 6],
            CastleSide::Queen => &[1, 2, 3],
        }
    }

    /// Columns the king stands on, crosses, or lands on.
    fn king_path_cols(self) -> &'static [u8] {
        match self {
            CastleSide::King => &[4, 5, 6],
            CastleSide::Queen => &[4, 3, 2],
        }
    }
}

/// A move together with snapshots of the pieces it touches, so that it can be
/// reversed without consulting anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    /// The moving piece as it stood before the move.
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub castle: Option<CastleSide>,
    pub en_passant: bool,
    pub promotion: Option<PieceKind>,
}

impl Move {
    pub fn new(from: Square, to: Square, piece: Piece) -> Self {
        Self {
            from,
            to,
            piece,
            captured: None,
            castle: None,
            en_passant: false,
            promotion: None,
        }
    }

    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub fn is_double_push(&self) -> bool {
        self.piece.kind == PieceKind::Pawn && self.from.row.abs_diff(self.to.row) == 2
    }

    /// Square of the piece removed by this move, if any.
    pub fn capture_square(&self) -> Option<Square> {
        self.captured.map(|_| {
            if self.en_passant {
                Square::new(self.from.row, self.to.col)
            } else {
                self.to
            }
        })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            let c = match kind {
                PieceKind::Queen => 'q',
                PieceKind::Rook => 'r',
                PieceKind::Bishop => 'b',
                PieceKind::Knight => 'n',
                PieceKind::Pawn | PieceKind::King => '?',
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Stateless legal-move generator over a [`Board`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveGenerator;

impl MoveGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Legal moves of the piece on `from`, or nothing if the square is empty.
    pub fn legal_moves_from(&self, board: &Board, from: Square) -> Vec<Move> {
        let Some(piece) = board.piece_at(from) else {
            return Vec::new();
        };
        let mut moves = Vec::new();
        self.pseudo_legal_from(board, from, piece, &mut moves);
        self.retain_legal(board, piece.color, &mut moves);
        moves
    }

    /// Legal moves for the side to move.
    pub fn legal_moves(&self, board: &Board) -> Vec<Move> {
        self.legal_moves_for(board, board.side_to_move)
    }

    pub fn legal_moves_for(&self, board: &Board, color: Color) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);
        for (from, piece) in board.pieces().filter(|(_, p)| p.color == color) {
            self.pseudo_legal_from(board, from, piece, &mut moves);
        }
        self.retain_legal(board, color, &mut moves);
        moves
    }

    /// Stops at the first legal move found.
    pub fn has_legal_move(&self, board: &Board, color: Color) -> bool {
        let mut scratch = board.clone();
        let mut moves = Vec::new();
        for (from, piece) in board.pieces().filter(|(_, p)| p.color == color) {
            moves.clear();
            self.pseudo_legal_from(board, from, piece, &mut moves);
            if moves.iter().any(|mv| self.keeps_king_safe(&mut scratch, *mv, color)) {
                return true;
            }
        }
        false
    }

    pub fn is_in_check(&self, board: &Board, color: Color) -> bool {
        match board.king_square(color) {
            Some(king) => self.is_square_attacked(board, king, color.opposite()),
            None => false,
        }
    }

    pub fn is_square_attacked(&self, board: &Board, square: Square, attacker: Color) -> bool {
        let holds = |sq: Option<Square>, kinds: &[PieceKind]| {
            sq.and_then(|s| board.piece_at(s))
                .is_some_and(|p| p.color == attacker && kinds.contains(&p.kind))
        };

        // A pawn attacks diagonally forward, so look one row behind the target.
        let behind = -attacker.forward();
        if holds(square.offset(behind, -1), &[PieceKind::Pawn])
            || holds(square.offset(behind, 1), &[PieceKind::Pawn])
        {
            return true;
        }

        if KNIGHT_OFFSETS
            .iter()
            .any(|&(dr, dc)| holds(square.offset(dr, dc), &[PieceKind::Knight]))
        {
            return true;
        }

        if KING_OFFSETS
            .iter()
            .any(|&(dr, dc)| holds(square.offset(dr, dc), &[PieceKind::King]))
        {
            return true;
        }

        let ray_hits = |directions: &[(i8, i8)], kinds: &[PieceKind]| {
            directions.iter().any(|&(dr, dc)| {
                let mut current = square.offset(dr, dc);
                while let Some(sq) = current {
                    if let Some(piece) = board.piece_at(sq) {
                        return piece.color == attacker && kinds.contains(&piece.kind);
                    }
                    current = sq.offset(dr, dc);
                }
                false
            })
        };

        ray_hits(&DIAGONALS, &[PieceKind::Bishop, PieceKind::Queen])
            || ray_hits(&ORTHOGONALS, &[PieceKind::Rook, PieceKind::Queen])
    }

    /// The square a pawn on `from` may capture en passant onto. Only the move
    /// played immediately before counts.
    pub fn en_passant_target(&self, board: &Board, from: Square, color: Color) -> Option<Square> {
        let last = board.last_move?;
        if last.piece.color == color || !last.is_double_push() {
            return None;
        }
        if last.to.row != from.row || last.to.col.abs_diff(from.col) != 1 {
            return None;
        }
        let victim = board.piece_at(last.to)?;
        if victim.kind != PieceKind::Pawn || victim.color == color {
            return None;
        }
        let target = Square::new((from.row as i8 + color.forward()) as u8, last.to.col);
        board.piece_at(target).is_none().then_some(target)
    }

    fn retain_legal(&self, board: &Board, color: Color, moves: &mut Vec<Move>) {
        let mut scratch = board.clone();
        moves.retain(|mv| self.keeps_king_safe(&mut scratch, *mv, color));
    }

    fn keeps_king_safe(&self, scratch: &mut Board, mv: Move, color: Color) -> bool {
        let undo = scratch.make_move(mv);
        let safe = !self.is_in_check(scratch, color);
        scratch.unmake_move(undo);
        safe
    }

    fn pseudo_legal_from(&self, board: &Board, from: Square, piece: Piece, moves: &mut Vec<Move>) {
        match piece.kind {
            PieceKind::Pawn => self.pawn_moves(board, from, piece, moves),
            PieceKind::Knight => self.step_moves(board, from, piece, &KNIGHT_OFFSETS, moves),
            PieceKind::Bishop => self.slide_moves(board, from, piece, &DIAGONALS, moves),
            PieceKind::Rook => self.slide_moves(board, from, piece, &ORTHOGONALS, moves),
            PieceKind::Queen => {
                self.slide_moves(board, from, piece, &DIAGONALS, moves);
                self.slide_moves(board, from, piece, &ORTHOGONALS, moves);
            }
            PieceKind::King => {
                self.step_moves(board, from, piece, &KING_OFFSETS, moves);
                self.castling_moves(board, from, piece, moves);
            }
        }
    }

    fn pawn_moves(&self, board: &Board, from: Square, piece: Piece, moves: &mut Vec<Move>) {
        let color = piece.color;
        let forward = color.forward();

        if let Some(one) = from.offset(forward, 0) {
            if board.piece_at(one).is_none() {
                self.push_pawn_move(Move::new(from, one, piece), moves);

                if !piece.has_moved && from.row == color.pawn_row() {
                    if let Some(two) = from.offset(2 * forward, 0) {
                        if board.piece_at(two).is_none() {
                            moves.push(Move::new(from, two, piece));
                        }
                    }
                }
            }
        }

        for d_col in [-1, 1] {
            let Some(to) = from.offset(forward, d_col) else {
                continue;
            };
            if let Some(target) = board.piece_at(to).filter(|p| p.color != color) {
                let mut mv = Move::new(from, to, piece);
                mv.captured = Some(target);
                self.push_pawn_move(mv, moves);
            }
        }

        if let Some(to) = self.en_passant_target(board, from, color) {
            let victim = Square::new(from.row, to.col);
            let mut mv = Move::new(from, to, piece);
            mv.en_passant = true;
            mv.captured = board.piece_at(victim);
            moves.push(mv);
        }
    }

    /// Expands a pawn move onto the last rank into one move per promotion piece.
    fn push_pawn_move(&self, mv: Move, moves: &mut Vec<Move>) {
        if mv.to.row == mv.piece.color.promotion_row() {
            for kind in PieceKind::PROMOTIONS {
                moves.push(Move {
                    promotion: Some(kind),
                    ..mv
                });
            }
        } else {
            moves.push(mv);
        }
    }

    fn step_moves(
        &self,
        board: &Board,
        from: Square,
        piece: Piece,
        offsets: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(dr, dc) in offsets {
            let Some(to) = from.offset(dr, dc) else {
                continue;
            };
            match board.piece_at(to) {
                None => moves.push(Move::new(from, to, piece)),
                Some(target) if target.color != piece.color => {
                    let mut mv = Move::new(from, to, piece);
                    mv.captured = Some(target);
                    moves.push(mv);
                }
                Some(_) => {}
            }
        }
    }

    fn slide_moves(
        &self,
        board: &Board,
        from: Square,
        piece: Piece,
        directions: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(dr, dc) in directions {
            let mut current = from.offset(dr, dc);
            while let Some(to) = current {
                match board.piece_at(to) {
                    None => moves.push(Move::new(from, to, piece)),
                    Some(target) => {
                        if target.color != piece.color {
                            let mut mv = Move::new(from, to, piece);
                            mv.captured = Some(target);
                            moves.push(mv);
                        }
                        break;
                    }
                }
                current = to.offset(dr, dc);
            }
        }
    }

    fn castling_moves(&self, board: &Board, from: Square, piece: Piece, moves: &mut Vec<Move>) {
        let color = piece.color;
        let row = color.home_row();
        if piece.has_moved || from != Square::new(row, 4) {
            return;
        }
        let enemy = color.opposite();
        if self.is_square_attacked(board, from, enemy) {
            return;
        }

        for side in [CastleSide::King, CastleSide::Queen] {
            if !board.can_castle(color, side) {
                continue;
            }
            if side
                .between_cols()
                .iter()
                .any(|&col| board.piece_at(Square::new(row, col)).is_some())
            {
                continue;
            }
            if side
                .king_path_cols()
                .iter()
                .any(|&col| self.is_square_attacked(board, Square::new(row, col), enemy))
            {
                continue;
            }
            let mut mv = Move::new(from, Square::new(row, side.king_target_col()), piece);
            mv.castle = Some(side);
            moves.push(mv);
        }
    }
}
