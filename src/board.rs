use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::movegen::{CastleSide, Move};

/// A board coordinate. Row 0 is the eighth rank (Black's back rank) and row 7
/// is the first rank, so White pawns advance toward row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    pub row: u8,
    pub col: u8,
}

impl Square {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn is_on_board(self) -> bool {
        self.row < 8 && self.col < 8
    }

    pub fn offset(self, d_row: i8, d_col: i8) -> Option<Square> {
        let row = self.row as i8 + d_row;
        let col = self.col as i8 + d_col;
        if (0..8).contains(&row) && (0..8).contains(&col) {
            Some(Square::new(row as u8, col as u8))
        } else {
            None
        }
    }

    /// Parses coordinates such as `e4`.
    pub fn from_algebraic(s: &str) -> Option<Square> {
        let mut chars = s.chars();
        let file = chars.next()?;
        let rank = chars.next()?;
        if chars.next().is_some() || !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
            return None;
        }
        let col = file as u8 - b'a';
        let row = 7 - (rank as u8 - b'1');
        Some(Square::new(row, col))
    }

    pub fn all() -> impl Iterator<Item = Square> {
        (0..8u8).flat_map(|row| (0..8u8).map(move |col| Square::new(row, col)))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.col) as char, 8 - self.row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Row delta of a pawn push.
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    pub fn home_row(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }

    pub fn pawn_row(self) -> u8 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    pub fn promotion_row(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const PROMOTIONS: [PieceKind; 4] = [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Material value in centipawns. The king is never summed.
    pub fn value(self) -> i32 {
        match self {
            PieceKind::Pawn => 100,
            PieceKind::Knight => 320,
            PieceKind::Bishop => 330,
            PieceKind::Rook => 500,
            PieceKind::Queen => 900,
            PieceKind::King => 0,
        }
    }

    pub fn is_promotion_target(self) -> bool {
        Self::PROMOTIONS.contains(&self)
    }

    fn to_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    fn from_char(c: char) -> Option<PieceKind> {
        Some(match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
    pub has_moved: bool,
}

impl Piece {
    pub const fn new(kind: PieceKind, color: Color) -> Self {
        Self {
            kind,
            color,
            has_moved: false,
        }
    }

    pub fn symbol(&self) -> char {
        let c = self.kind.to_char();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }
}

/// Token returned by [`Board::make_move`]. Handing it back to
/// [`Board::unmake_move`] restores the exact prior position; it cannot be
/// cloned, so each move is undone at most once.
#[derive(Debug)]
#[must_use = "an unused Undo token makes the move irreversible"]
pub struct Undo {
    mv: Move,
    last_move: Option<Move>,
    side_to_move: Color,
}

impl Undo {
    /// Rebuilds the token for a move already present on the board, given the
    /// move that preceded it. Used when rehydrating a stored history.
    pub(crate) fn restore(mv: Move, last_move: Option<Move>) -> Self {
        Self {
            mv,
            last_move,
            side_to_move: mv.piece.color,
        }
    }

    pub fn mv(&self) -> &Move {
        &self.mv
    }
}

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
    pub side_to_move: Color,
    /// Only the immediately preceding move matters for en passant.
    pub last_move: Option<Move>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// The standard starting position.
    pub fn new() -> Self {
        let mut board = Self::empty();
        for (col, kind) in BACK_RANK.iter().enumerate() {
            let col = col as u8;
            for color in [Color::White, Color::Black] {
                board.put(Square::new(color.home_row(), col), Piece::new(*kind, color));
                board.put(
                    Square::new(color.pawn_row(), col),
                    Piece::new(PieceKind::Pawn, color),
                );
            }
        }
        board
    }

    pub fn empty() -> Self {
        Self {
            squares: [[None; 8]; 8],
            side_to_move: Color::White,
            last_move: None,
        }
    }

    pub(crate) fn from_grid(
        squares: [[Option<Piece>; 8]; 8],
        side_to_move: Color,
        last_move: Option<Move>,
    ) -> Self {
        Self {
            squares,
            side_to_move,
            last_move,
        }
    }

    pub fn grid(&self) -> &[[Option<Piece>; 8]; 8] {
        &self.squares
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.row as usize][square.col as usize]
    }

    pub fn put(&mut self, square: Square, piece: Piece) {
        self.squares[square.row as usize][square.col as usize] = Some(piece);
    }

    pub fn take(&mut self, square: Square) -> Option<Piece> {
        self.squares[square.row as usize][square.col as usize].take()
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, p)| p.kind == PieceKind::King && p.color == color)
            .map(|(sq, _)| sq)
    }

    /// Castling is available on a side while the king and that rook are both
    /// unmoved on their home squares.
    pub fn can_castle(&self, color: Color, side: CastleSide) -> bool {
        let row = color.home_row();
        let king = self.piece_at(Square::new(row, 4));
        let rook = self.piece_at(Square::new(row, side.rook_col()));
        matches!(king, Some(p) if p.kind == PieceKind::King && p.color == color && !p.has_moved)
            && matches!(rook, Some(p) if p.kind == PieceKind::Rook && p.color == color && !p.has_moved)
    }

    /// Checks the one-king-per-color invariant.
    pub fn validate(&self) -> Result<(), EngineError> {
        for color in [Color::White, Color::Black] {
            let kings = self
                .pieces()
                .filter(|(_, p)| p.kind == PieceKind::King && p.color == color)
                .count();
            match kings {
                0 => return Err(EngineError::MissingKing(color)),
                1 => {}
                _ => return Err(EngineError::ExtraKing(color)),
            }
        }
        Ok(())
    }

    pub fn make_move(&mut self, mv: Move) -> Undo {
        let undo = Undo {
            mv,
            last_move: self.last_move,
            side_to_move: self.side_to_move,
        };

        self.take(mv.from);
        if let Some(square) = mv.capture_square() {
            self.take(square);
        }

        let mut moved = mv.piece;
        moved.has_moved = true;
        if let Some(kind) = mv.promotion {
            moved.kind = kind;
        }
        self.put(mv.to, moved);

        if let Some(side) = mv.castle {
            let row = mv.from.row;
            if let Some(mut rook) = self.take(Square::new(row, side.rook_col())) {
                rook.has_moved = true;
                self.put(Square::new(row, side.rook_target_col()), rook);
            }
        }

        self.last_move = Some(mv);
        self.side_to_move = mv.piece.color.opposite();
        undo
    }

    pub fn unmake_move(&mut self, undo: Undo) {
        let mv = undo.mv;

        if let Some(side) = mv.castle {
            let row = mv.from.row;
            if let Some(mut rook) = self.take(Square::new(row, side.rook_target_col())) {
                rook.has_moved = false;
                self.put(Square::new(row, side.rook_col()), rook);
            }
        }

        self.take(mv.to);
        self.put(mv.from, mv.piece);
        if let (Some(captured), Some(square)) = (mv.captured, mv.capture_square()) {
            self.put(square, captured);
        }

        self.last_move = undo.last_move;
        self.side_to_move = undo.side_to_move;
    }

    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(EngineError::InvalidFen(format!(
                "expected at least 4 fields, found {}",
                fields.len()
            )));
        }

        let mut board = Board::empty();
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(EngineError::InvalidFen(format!(
                "expected 8 ranks, found {}",
                ranks.len()
            )));
        }
        for (row, rank) in ranks.iter().enumerate() {
            let mut col = 0u8;
            for c in rank.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if skip == 0 || col as u32 + skip > 8 {
                        return Err(EngineError::InvalidFen(format!("rank {} too long", 8 - row)));
                    }
                    col += skip as u8;
                    continue;
                }
                let kind = PieceKind::from_char(c)
                    .ok_or_else(|| EngineError::InvalidFen(format!("unknown piece '{}'", c)))?;
                if col >= 8 {
                    return Err(EngineError::InvalidFen(format!("rank {} too long", 8 - row)));
                }
                let color = if c.is_ascii_uppercase() {
                    Color::White
                } else {
                    Color::Black
                };
                let square = Square::new(row as u8, col);
                let has_moved = match kind {
                    PieceKind::Pawn => square.row != color.pawn_row(),
                    PieceKind::King | PieceKind::Rook => true,
                    _ => false,
                };
                board.put(
                    square,
                    Piece {
                        kind,
                        color,
                        has_moved,
                    },
                );
                col += 1;
            }
            if col != 8 {
                return Err(EngineError::InvalidFen(format!(
                    "rank {} has {} files",
                    8 - row,
                    col
                )));
            }
        }

        board.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(EngineError::InvalidFen(format!("bad side to move '{}'", other)))
            }
        };

        if fields[2] != "-" {
            for c in fields[2].chars() {
                let (color, side) = match c {
                    'K' => (Color::White, CastleSide::King),
                    'Q' => (Color::White, CastleSide::Queen),
                    'k' => (Color::Black, CastleSide::King),
                    'q' => (Color::Black, CastleSide::Queen),
                    other => {
                        return Err(EngineError::InvalidFen(format!(
                            "bad castling flag '{}'",
                            other
                        )))
                    }
                };
                let row = color.home_row();
                for (col, kind) in [(4, PieceKind::King), (side.rook_col(), PieceKind::Rook)] {
                    let square = Square::new(row, col);
                    match board.squares[row as usize][col as usize].as_mut() {
                        Some(p) if p.color == color && p.kind == kind => p.has_moved = false,
                        _ => {
                            return Err(EngineError::InvalidFen(format!(
                                "castling flag '{}' without {} {:?} on {}",
                                c, color, kind, square
                            )))
                        }
                    }
                }
            }
        }

        if fields[3] != "-" {
            let target = Square::from_algebraic(fields[3])
                .ok_or_else(|| EngineError::InvalidFen(format!("bad en passant square '{}'", fields[3])))?;
            let pusher = board.side_to_move.opposite();
            let from = target.offset(-pusher.forward(), 0);
            let to = target.offset(pusher.forward(), 0);
            match (from, to) {
                (Some(from), Some(to))
                    if matches!(board.piece_at(to), Some(p) if p.kind == PieceKind::Pawn && p.color == pusher) =>
                {
                    board.last_move = Some(Move::new(from, to, Piece::new(PieceKind::Pawn, pusher)));
                }
                _ => {
                    return Err(EngineError::InvalidFen(format!(
                        "no pawn behind en passant square {}",
                        target
                    )))
                }
            }
        }

        Ok(board)
    }

    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for row in 0..8 {
            let mut empty = 0;
            for col in 0..8 {
                match self.squares[row][col] {
                    Some(piece) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(piece.symbol());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if row < 7 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        let mut rights = String::new();
        for (color, side, flag) in [
            (Color::White, CastleSide::King, 'K'),
            (Color::White, CastleSide::Queen, 'Q'),
            (Color::Black, CastleSide::King, 'k'),
            (Color::Black, CastleSide::Queen, 'q'),
        ] {
            if self.can_castle(color, side) {
                rights.push(flag);
            }
        }
        if rights.is_empty() {
            rights.push('-');
        }
        fen.push(' ');
        fen.push_str(&rights);

        fen.push(' ');
        match self.last_move.filter(|mv| mv.is_double_push()) {
            Some(mv) => {
                let skipped = Square::new((mv.from.row + mv.to.row) / 2, mv.from.col);
                fen.push_str(&skipped.to_string());
            }
            None => fen.push('-'),
        }

        fen.push_str(" 0 1");
        fen
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut result = String::new();
        for row in 0..8 {
            for col in 0..8 {
                result.push(self.squares[row][col].map_or('.', |p| p.symbol()));
                if col < 7 {
                    result.push(' ');
                }
            }
            result.push('\n');
        }
        write!(f, "{}", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::MoveGenerator;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn test_square_coordinates() {
        assert_eq!(sq("a8"), Square::new(0, 0));
        assert_eq!(sq("h1"), Square::new(7, 7));
        assert_eq!(sq("e4").to_string(), "e4");
        assert_eq!(Square::from_algebraic("i9"), None);
        assert_eq!(Square::from_algebraic("e44"), None);
    }

    #[test]
    fn test_initial_position() {
        let board = Board::new();
        assert!(board.validate().is_ok());
        assert_eq!(board.pieces().count(), 32);
        assert_eq!(board.king_square(Color::White), Some(sq("e1")));
        assert_eq!(board.king_square(Color::Black), Some(sq("e8")));
        assert_eq!(board.to_fen(), START_FEN);
        assert_eq!(Board::from_fen(START_FEN).unwrap(), board);
    }

    #[test]
    fn test_validate_kings() {
        let mut board = Board::new();
        board.take(sq("e8"));
        assert_eq!(board.validate(), Err(EngineError::MissingKing(Color::Black)));

        let mut board = Board::new();
        board.put(sq("e4"), Piece::new(PieceKind::King, Color::White));
        assert_eq!(board.validate(), Err(EngineError::ExtraKing(Color::White)));
    }

    #[test]
    fn test_fen_round_trip() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 1",
            "r3k2r/8/8/8/8/8/8/R3K2R b Kq - 0 1",
        ];
        for fen in fens {
            assert_eq!(Board::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn test_fen_rejects_garbage() {
        assert!(Board::from_fen("").is_err());
        assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1").is_err());
        assert!(Board::from_fen("rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
        assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/4K3 w K - 0 1").is_err());
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - e6 0 1").is_err());
    }

    #[test]
    fn test_fen_rejects_overlong_rank() {
        let fen = format!("{}/8/8/8/8/8/8/4K3 w - - 0 1", "9".repeat(40));
        assert!(matches!(Board::from_fen(&fen), Err(EngineError::InvalidFen(_))));
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/4K2 w - - 0 1").is_err());
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/4K0003 w - - 0 1").is_err());
        assert!(Board::from_fen("4k4/8/8/8/8/8/8/4K3 w - - 0 1").is_err());
    }

    #[test]
    fn test_castling_flag_needs_king_and_rook() {
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/4K2B w K - 0 1").is_err());
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/4Q2R w K - 0 1").is_err());
        let board = Board::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(board.can_castle(Color::White, CastleSide::King));
    }

    #[test]
    fn test_make_unmake_restores_every_move() {
        let generator = MoveGenerator::new();
        let fens = [
            START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 1",
            "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
        ];
        for fen in fens {
            let original = Board::from_fen(fen).unwrap();
            let mut board = original.clone();
            for mv in generator.legal_moves(&original) {
                let undo = board.make_move(mv);
                assert_ne!(board, original, "{} changed nothing", mv);
                board.unmake_move(undo);
                assert_eq!(board, original, "{} did not round-trip", mv);
            }
        }
    }

    #[test]
    fn test_castling_moves_rook_and_marks_pieces() {
        let generator = MoveGenerator::new();
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castle = generator
            .legal_moves(&board)
            .into_iter()
            .find(|mv| mv.castle == Some(CastleSide::Queen))
            .unwrap();
        let undo = board.make_move(castle);
        assert_eq!(board.piece_at(sq("c1")).map(|p| p.kind), Some(PieceKind::King));
        assert_eq!(board.piece_at(sq("d1")).map(|p| p.kind), Some(PieceKind::Rook));
        assert!(board.piece_at(sq("a1")).is_none());
        assert!(!board.can_castle(Color::White, CastleSide::King));
        assert!(board.can_castle(Color::Black, CastleSide::Queen));
        board.unmake_move(undo);
        assert!(board.can_castle(Color::White, CastleSide::Queen));
    }

    #[test]
    fn test_display() {
        let board = Board::new();
        let text = board.to_string();
        assert!(text.starts_with("r n b q k b n r\n"));
        assert!(text.ends_with("R N B Q K B N R\n"));
    }
}
