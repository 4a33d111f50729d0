use std::collections::HashMap;
use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::{Board, Color, Piece};

struct ZobristKeys {
    // [square][color * 12 + kind * 2 + has_moved]
    pieces: [[u64; 24]; 64],
    black_to_move: u64,
    en_passant_file: [u64; 8],
}

fn keys() -> &'static ZobristKeys {
    static KEYS: OnceLock<ZobristKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(0x5a1_0c4e5);
        let mut pieces = [[0u64; 24]; 64];
        for square in pieces.iter_mut() {
            for key in square.iter_mut() {
                *key = rng.gen();
            }
        }
        let black_to_move = rng.gen();
        let mut en_passant_file = [0u64; 8];
        for key in en_passant_file.iter_mut() {
            *key = rng.gen();
        }
        ZobristKeys {
            pieces,
            black_to_move,
            en_passant_file,
        }
    })
}

fn piece_slot(piece: Piece) -> usize {
    piece.color.index() * 12 + piece.kind.index() * 2 + piece.has_moved as usize
}

/// Zobrist hash over everything that affects move generation: placement,
/// moved flags, side to move and a pending en passant file.
pub fn position_hash(board: &Board) -> u64 {
    let keys = keys();
    let mut hash = 0u64;
    for (square, piece) in board.pieces() {
        let index = square.row as usize * 8 + square.col as usize;
        hash ^= keys.pieces[index][piece_slot(piece)];
    }
    if board.side_to_move == Color::Black {
        hash ^= keys.black_to_move;
    }
    if let Some(mv) = board.last_move.filter(|mv| mv.is_double_push()) {
        hash ^= keys.en_passant_file[mv.to.col as usize];
    }
    hash
}

/// Legal-move counts for both colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MobilityEntry {
    pub white: u32,
    pub black: u32,
}

/// Bounded map from position hash to mobility counts, so that leaf
/// evaluation does not regenerate move lists for positions already seen.
pub struct MobilityCache {
    table: HashMap<u64, MobilityEntry>,
    size: usize,
}

impl MobilityCache {
    pub fn new(size: usize) -> Self {
        Self {
            table: HashMap::with_capacity(size.min(1 << 16)),
            size: size.max(1),
        }
    }

    pub fn store(&mut self, hash: u64, entry: MobilityEntry) {
        if self.table.len() >= self.size && !self.table.contains_key(&hash) {
            if let Some(&evicted) = self.table.keys().next() {
                self.table.remove(&evicted);
            }
        }
        self.table.insert(hash, entry);
    }

    pub fn probe(&self, hash: u64) -> Option<MobilityEntry> {
        self.table.get(&hash).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Square;
    use crate::movegen::MoveGenerator;

    #[test]
    fn test_hash_tracks_position_not_path() {
        let generator = MoveGenerator::new();
        let start = Board::new();
        let mut board = start.clone();
        let knight_out = generator.legal_moves_from(&board, Square::from_algebraic("g1").unwrap())[0];
        let undo = board.make_move(knight_out);
        assert_ne!(position_hash(&board), position_hash(&start));
        board.unmake_move(undo);
        assert_eq!(position_hash(&board), position_hash(&start));
    }

    #[test]
    fn test_hash_sees_side_and_en_passant() {
        let plain = Board::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - - 0 1").unwrap();
        let with_ep = Board::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        assert_ne!(position_hash(&plain), position_hash(&with_ep));

        let mut black = plain.clone();
        black.side_to_move = Color::Black;
        assert_ne!(position_hash(&plain), position_hash(&black));
    }

    #[test]
    fn test_cache_is_bounded() {
        let mut cache = MobilityCache::new(2);
        let entry = MobilityEntry { white: 20, black: 20 };
        cache.store(1, entry);
        cache.store(2, entry);
        cache.store(3, entry);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.probe(3), Some(entry));
        cache.store(3, MobilityEntry { white: 1, black: 2 });
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.probe(3).map(|e| e.black), Some(2));
    }
}
