use serde::{Deserialize, Serialize};

use crate::board::{Board, Color, Piece, PieceKind, Square};
use crate::cache::{position_hash, MobilityCache, MobilityEntry};
use crate::config::StyleWeights;
use crate::movegen::{CastleSide, MoveGenerator};

// Tables are laid out from White's point of view with row 0 = eighth rank;
// Black reads them row-mirrored.

const PAWN_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [50, 50, 50, 50, 50, 50, 50, 50],
    [10, 10, 20, 30, 30, 20, 10, 10],
    [5, 5, 10, 25, 25, 10, 5, 5],
    [0, 0, 0, 20, 20, 0, 0, 0],
    [5, -5, -10, 0, 0, -10, -5, 5],
    [5, 10, 10, -20, -20, 10, 10, 5],
    [0, 0, 0, 0, 0, 0, 0, 0],
];

const KNIGHT_TABLE: [[i32; 8]; 8] = [
    [-50, -40, -30, -30, -30, -30, -40, -50],
    [-40, -20, 0, 0, 0, 0, -20, -40],
    [-30, 0, 10, 15, 15, 10, 0, -30],
    [-30, 5, 15, 20, 20, 15, 5, -30],
    [-30, 0, 15, 20, 20, 15, 0, -30],
    [-30, 5, 10, 15, 15, 10, 5, -30],
    [-40, -20, 0, 5, 5, 0, -20, -40],
    [-50, -40, -30, -30, -30, -30, -40, -50],
];

const BISHOP_TABLE: [[i32; 8]; 8] = [
    [-20, -10, -10, -10, -10, -10, -10, -20],
    [-10, 0, 0, 0, 0, 0, 0, -10],
    [-10, 0, 5, 10, 10, 5, 0, -10],
    [-10, 5, 5, 10, 10, 5, 5, -10],
    [-10, 0, 10, 10, 10, 10, 0, -10],
    [-10, 10, 10, 10, 10, 10, 10, -10],
    [-10, 5, 0, 0, 0, 0, 5, -10],
    [-20, -10, -10, -10, -10, -10, -10, -20],
];

const ROOK_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [5, 10, 10, 10, 10, 10, 10, 5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [0, 0, 0, 5, 5, 0, 0, 0],
];

const QUEEN_TABLE: [[i32; 8]; 8] = [
    [-20, -10, -10, -5, -5, -10, -10, -20],
    [-10, 0, 0, 0, 0, 0, 0, -10],
    [-10, 0, 5, 5, 5, 5, 0, -10],
    [-5, 0, 5, 5, 5, 5, 0, -5],
    [0, 0, 5, 5, 5, 5, 0, -5],
    [-10, 5, 5, 5, 5, 5, 0, -10],
    [-10, 0, 5, 0, 0, 0, 0, -10],
    [-20, -10, -10, -5, -5, -10, -10, -20],
];

const KING_MIDDLEGAME_TABLE: [[i32; 8]; 8] = [
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-20, -30, -30, -40, -40, -30, -30, -20],
    [-10, -20, -20, -20, -20, -20, -20, -10],
    [20, 20, 0, 0, 0, 0, 20, 20],
    [20, 30, 10, 0, 0, 10, 30, 20],
];

const KING_ENDGAME_TABLE: [[i32; 8]; 8] = [
    [-50, -40, -30, -20, -20, -30, -40, -50],
    [-30, -20, -10, 0, 0, -10, -20, -30],
    [-30, -10, 20, 30, 30, 20, -10, -30],
    [-30, -10, 30, 40, 40, 30, -10, -30],
    [-30, -10, 30, 40, 40, 30, -10, -30],
    [-30, -10, 20, 30, 30, 20, -10, -30],
    [-30, -30, 0, 0, 0, 0, -30, -30],
    [-50, -30, -30, -30, -30, -30, -30, -50],
];

pub const MOBILITY_WEIGHT: i32 = 4;
pub const KING_ZONE_ATTACK_PENALTY: i32 = 15;
pub const CASTLING_RIGHTS_BONUS: i32 = 20;
pub const DOUBLED_PAWN_PENALTY: i32 = 15;
pub const ISOLATED_PAWN_PENALTY: i32 = 20;

/// Non-king material on the board (both sides) at or above which the game
/// still counts as the opening.
pub const OPENING_MATERIAL: i32 = 7_200;
/// Below this the endgame king table takes over.
pub const ENDGAME_MATERIAL: i32 = 2_600;

const MOBILITY_CACHE_SIZE: usize = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

impl GamePhase {
    pub fn of(board: &Board) -> GamePhase {
        let material = total_material(board);
        if material >= OPENING_MATERIAL {
            GamePhase::Opening
        } else if material < ENDGAME_MATERIAL {
            GamePhase::Endgame
        } else {
            GamePhase::Middlegame
        }
    }
}

/// Sum of piece values of both colors, kings excluded.
pub fn total_material(board: &Board) -> i32 {
    board.pieces().map(|(_, p)| p.kind.value()).sum()
}

/// Own material minus the opponent's.
pub fn material_balance(board: &Board, color: Color) -> i32 {
    board
        .pieces()
        .map(|(_, p)| {
            if p.color == color {
                p.kind.value()
            } else {
                -p.kind.value()
            }
        })
        .sum()
}

/// Table bonus for `piece` standing on `square`.
pub fn piece_square_value(piece: Piece, square: Square, endgame: bool) -> i32 {
    let row = match piece.color {
        Color::White => square.row as usize,
        Color::Black => 7 - square.row as usize,
    };
    let col = square.col as usize;
    let table = match piece.kind {
        PieceKind::Pawn => &PAWN_TABLE,
        PieceKind::Knight => &KNIGHT_TABLE,
        PieceKind::Bishop => &BISHOP_TABLE,
        PieceKind::Rook => &ROOK_TABLE,
        PieceKind::Queen => &QUEEN_TABLE,
        PieceKind::King if endgame => &KING_ENDGAME_TABLE,
        PieceKind::King => &KING_MIDDLEGAME_TABLE,
    };
    table[row][col]
}

/// Unscaled evaluation terms, each White minus Black.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalTerms {
    pub material: i32,
    pub positional: i32,
    pub mobility: i32,
    pub king_safety: i32,
    pub pawn_structure: i32,
}

pub struct Evaluator {
    style: StyleWeights,
    generator: MoveGenerator,
    mobility_cache: MobilityCache,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_style(StyleWeights::default())
    }

    pub fn with_style(style: StyleWeights) -> Self {
        Self {
            style,
            generator: MoveGenerator::new(),
            mobility_cache: MobilityCache::new(MOBILITY_CACHE_SIZE),
        }
    }

    pub fn style(&self) -> &StyleWeights {
        &self.style
    }

    pub fn set_style(&mut self, style: StyleWeights) {
        self.style = style;
    }

    /// Centipawn score of `board` from `perspective`'s side.
    pub fn evaluate(&mut self, board: &Board, perspective: Color) -> i32 {
        let terms = self.terms(board);
        let scale = |value: i32, weight: f32| (value as f32 * weight).round() as i32;
        let score = scale(terms.material, self.style.material)
            + scale(terms.positional, self.style.positional)
            + scale(terms.mobility, self.style.mobility)
            + scale(terms.king_safety, self.style.king_safety)
            + scale(terms.pawn_structure, self.style.pawn_structure);
        match perspective {
            Color::White => score,
            Color::Black => -score,
        }
    }

    pub fn terms(&mut self, board: &Board) -> EvalTerms {
        debug_assert!(board.validate().is_ok(), "evaluating a malformed board");
        let endgame = GamePhase::of(board) == GamePhase::Endgame;

        let mut terms = EvalTerms::default();
        for (square, piece) in board.pieces() {
            let sign = if piece.color == Color::White { 1 } else { -1 };
            terms.material += sign * piece.kind.value();
            terms.positional += sign * piece_square_value(piece, square, endgame);
        }

        let mobility = self.mobility(board);
        terms.mobility = (mobility.white as i32 - mobility.black as i32) * MOBILITY_WEIGHT;
        terms.king_safety = self.king_safety(board, Color::White) - self.king_safety(board, Color::Black);
        terms.pawn_structure =
            self.pawn_structure(board, Color::White) - self.pawn_structure(board, Color::Black);
        terms
    }

    fn mobility(&mut self, board: &Board) -> MobilityEntry {
        let hash = position_hash(board);
        if let Some(entry) = self.mobility_cache.probe(hash) {
            return entry;
        }
        let entry = MobilityEntry {
            white: self.generator.legal_moves_for(board, Color::White).len() as u32,
            black: self.generator.legal_moves_for(board, Color::Black).len() as u32,
        };
        self.mobility_cache.store(hash, entry);
        entry
    }

    fn king_safety(&self, board: &Board, color: Color) -> i32 {
        let Some(king) = board.king_square(color) else {
            return 0;
        };
        let enemy = color.opposite();
        let attacked = [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)]
            .iter()
            .filter_map(|&(dr, dc)| king.offset(dr, dc))
            .filter(|&sq| self.generator.is_square_attacked(board, sq, enemy))
            .count() as i32;

        let mut score = -attacked * KING_ZONE_ATTACK_PENALTY;
        if board.can_castle(color, CastleSide::King) || board.can_castle(color, CastleSide::Queen) {
            score += CASTLING_RIGHTS_BONUS;
        }
        score
    }

    fn pawn_structure(&self, board: &Board, color: Color) -> i32 {
        let mut files = [0i32; 8];
        for (square, piece) in board.pieces() {
            if piece.kind == PieceKind::Pawn && piece.color == color {
                files[square.col as usize] += 1;
            }
        }

        let mut score = 0;
        for file in 0..8 {
            let count = files[file];
            if count > 1 {
                score -= DOUBLED_PAWN_PENALTY * (count - 1);
            }
            let left = file > 0 && files[file - 1] > 0;
            let right = file < 7 && files[file + 1] > 0;
            if count > 0 && !left && !right {
                score -= ISOLATED_PAWN_PENALTY * count;
            }
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(board: &mut Board, from: &str, to: &str) {
        let from = Square::from_algebraic(from).unwrap();
        let to = Square::from_algebraic(to).unwrap();
        let mv = MoveGenerator::new()
            .legal_moves_from(board, from)
            .into_iter()
            .find(|mv| mv.to == to)
            .unwrap();
        let _ = board.make_move(mv);
    }

    #[test]
    fn test_start_position_is_balanced() {
        let mut evaluator = Evaluator::new();
        let board = Board::new();
        assert_eq!(evaluator.evaluate(&board, Color::White), 0);
        assert_eq!(evaluator.evaluate(&board, Color::Black), 0);
        assert_eq!(GamePhase::of(&board), GamePhase::Opening);
    }

    #[test]
    fn test_symmetric_opening_keeps_material_level() {
        let mut board = Board::new();
        play(&mut board, "e2", "e4");
        play(&mut board, "e7", "e5");
        assert_eq!(material_balance(&board, Color::White), 0);
        let terms = Evaluator::new().terms(&board);
        assert_eq!(terms.material, 0);
        assert_eq!(terms.positional, 0);
    }

    #[test]
    fn test_pawn_capture_moves_material_by_one_pawn() {
        let mut board = Board::new();
        play(&mut board, "e2", "e4");
        play(&mut board, "d7", "d5");
        let before = material_balance(&board, Color::White);
        play(&mut board, "e4", "d5");
        assert_eq!(material_balance(&board, Color::White) - before, 100);
        assert_eq!(material_balance(&board, Color::Black), -100);
    }

    #[test]
    fn test_perspective_flips_sign() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let mut evaluator = Evaluator::new();
        let white = evaluator.evaluate(&board, Color::White);
        assert!(white > 800);
        assert_eq!(evaluator.evaluate(&board, Color::Black), -white);
    }

    #[test]
    fn test_doubled_and_isolated_pawns() {
        let evaluator = Evaluator::new();
        let board = Board::from_fen("4k3/8/8/8/4P3/4P3/8/4K3 w - - 0 1").unwrap();
        // One doubled pawn and two isolated pawns on the e-file.
        assert_eq!(
            evaluator.pawn_structure(&board, Color::White),
            -DOUBLED_PAWN_PENALTY - 2 * ISOLATED_PAWN_PENALTY
        );
        let board = Board::from_fen("4k3/8/8/8/8/8/3PP3/4K3 w - - 0 1").unwrap();
        assert_eq!(evaluator.pawn_structure(&board, Color::White), 0);
    }

    #[test]
    fn test_king_safety_counts_attacked_neighbours() {
        let evaluator = Evaluator::new();
        // The rook on a2 sweeps d2, e2 and f2.
        let board = Board::from_fen("4k3/8/8/8/8/8/r7/4K3 w - - 0 1").unwrap();
        assert_eq!(
            evaluator.king_safety(&board, Color::White),
            -3 * KING_ZONE_ATTACK_PENALTY
        );
        let board = Board::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert_eq!(evaluator.king_safety(&board, Color::White), CASTLING_RIGHTS_BONUS);
    }

    #[test]
    fn test_endgame_switches_king_table() {
        let board = Board::from_fen("4k3/8/8/8/3K4/8/8/8 w - - 0 1").unwrap();
        assert_eq!(GamePhase::of(&board), GamePhase::Endgame);
        let king = Piece::new(PieceKind::King, Color::White);
        let d4 = Square::from_algebraic("d4").unwrap();
        assert_eq!(piece_square_value(king, d4, true), 40);
        assert_eq!(piece_square_value(king, d4, false), -40);

        let middlegame = Board::from_fen("r2qk3/ppp5/8/8/8/8/PPP5/R2QK3 w - - 0 1").unwrap();
        assert_eq!(GamePhase::of(&middlegame), GamePhase::Middlegame);
    }

    #[test]
    fn test_black_reads_tables_mirrored() {
        let white = Piece::new(PieceKind::Knight, Color::White);
        let black = Piece::new(PieceKind::Knight, Color::Black);
        let f3 = Square::from_algebraic("f3").unwrap();
        let f6 = Square::from_algebraic("f6").unwrap();
        assert_eq!(piece_square_value(white, f3, false), piece_square_value(black, f6, false));
    }

    #[test]
    fn test_style_scales_terms() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let mut plain = Evaluator::new();
        let terms = plain.terms(&board);
        let mut material_only = Evaluator::with_style(StyleWeights {
            material: 2.0,
            positional: 0.0,
            mobility: 0.0,
            king_safety: 0.0,
            pawn_structure: 0.0,
        });
        assert_eq!(material_only.evaluate(&board, Color::White), 2 * terms.material);
    }
}
