use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::board::{Board, PieceKind};
use crate::config::{SearchLimits, StyleWeights};
use crate::error::EngineError;
use crate::evaluation::Evaluator;
use crate::movegen::{Move, MoveGenerator};

pub const INFINITY: i32 = 1_000_000;
pub const MATE_SCORE: i32 = 10_000;
/// Any score at least this large in magnitude announces a forced mate.
pub const MATE_THRESHOLD: i32 = 9_000;
/// Slack added to a capture's best-case gain before quiescence skips it.
pub const DELTA_MARGIN: i32 = 200;

pub fn is_mate_score(score: i32) -> bool {
    score.abs() >= MATE_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredMove {
    pub mv: Move,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    pub best_move: Move,
    pub score: i32,
    /// Deepest fully completed iteration.
    pub depth: u32,
    pub nodes: u64,
    pub elapsed: Duration,
}

/// Value used to order captures: the king sorts last as an attacker.
fn order_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::King => 20_000,
        other => other.value(),
    }
}

fn move_order_score(mv: &Move) -> i32 {
    if let Some(victim) = mv.captured {
        // MVV-LVA, offset so every capture precedes every quiet move.
        return 1_000_000 + order_value(victim.kind) - order_value(mv.piece.kind);
    }
    if let Some(promotion) = mv.promotion {
        return 500_000 + promotion.value();
    }
    0
}

/// Captures first by MVV-LVA, then promotions, then the rest. The sort is
/// stable so equal moves keep generation order.
pub fn order_moves(moves: &mut [Move]) {
    moves.sort_by_key(|mv| std::cmp::Reverse(move_order_score(mv)));
}

/// Best-case material swing of a capture, used for delta pruning.
fn capture_gain(mv: &Move) -> i32 {
    let victim = mv.captured.map_or(0, |p| p.kind.value());
    let promotion = mv
        .promotion
        .map_or(0, |kind| kind.value() - PieceKind::Pawn.value());
    victim + promotion
}

/// Negamax alpha-beta searcher. Each call works on a private copy of the
/// caller's board and restores it with make/unmake pairs.
pub struct Search {
    evaluator: Evaluator,
    move_generator: MoveGenerator,
    limits: SearchLimits,
    nodes_searched: u64,
    deadline: Option<Instant>,
    stop: Arc<AtomicBool>,
    aborted: bool,
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

impl Search {
    pub fn new() -> Self {
        Self::with_limits(SearchLimits::default(), StyleWeights::default())
    }

    pub fn with_limits(limits: SearchLimits, style: StyleWeights) -> Self {
        Self {
            evaluator: Evaluator::with_style(style),
            move_generator: MoveGenerator::new(),
            limits,
            nodes_searched: 0,
            deadline: None,
            stop: Arc::new(AtomicBool::new(false)),
            aborted: false,
        }
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    pub fn set_limits(&mut self, limits: SearchLimits) {
        self.limits = limits;
    }

    pub fn set_style(&mut self, style: StyleWeights) {
        self.evaluator.set_style(style);
    }

    /// Raising the returned flag stops the running search at its next node,
    /// or the next search if none is running. It is lowered again when that
    /// search returns.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn get_nodes_searched(&self) -> u64 {
        self.nodes_searched
    }

    /// Picks a move for the side to move. Fixed-depth unless a time budget is
    /// configured, in which case it deepens iteratively. `Ok(None)` means the
    /// side to move has no legal moves.
    pub fn find_best_move(&mut self, board: &Board) -> Result<Option<SearchResult>, EngineError> {
        match self.limits.time_budget() {
            Some(budget) => self.iterative_deepening(board, self.limits.max_depth, budget),
            None => self.search_depth(board, self.limits.max_depth),
        }
    }

    /// Full-width search to exactly `depth` plies, no deadline. Stopped
    /// through the stop handle before it finishes, it returns the first
    /// ordered move at depth 0.
    pub fn search_depth(&mut self, board: &Board, depth: u32) -> Result<Option<SearchResult>, EngineError> {
        let depth = depth.max(1);
        let outcome = self.run(board, depth, depth, None);
        self.finish();
        outcome
    }

    /// Deepens one ply at a time until `max_depth` or the budget is spent,
    /// keeping the result of the last iteration that finished.
    pub fn iterative_deepening(
        &mut self,
        board: &Board,
        max_depth: u32,
        budget: Duration,
    ) -> Result<Option<SearchResult>, EngineError> {
        let outcome = self.run(board, 1, max_depth.max(1), Some(budget));
        self.finish();
        outcome
    }

    /// Scores every root move with a full window, best first. A stopped
    /// ranking holds only the moves scored before the stop.
    pub fn rank_moves(&mut self, board: &Board, depth: u32) -> Result<Vec<ScoredMove>, EngineError> {
        let outcome = self.rank_root(board, depth.max(1));
        self.finish();
        outcome
    }

    fn run(
        &mut self,
        board: &Board,
        first_depth: u32,
        last_depth: u32,
        budget: Option<Duration>,
    ) -> Result<Option<SearchResult>, EngineError> {
        board.validate()?;
        let start = Instant::now();
        self.begin(budget.map(|budget| start + budget));
        let mut scratch = board.clone();

        let mut moves = self.move_generator.legal_moves(&scratch);
        if moves.is_empty() {
            return Ok(None);
        }
        order_moves(&mut moves);

        let mut completed: Option<SearchResult> = None;
        for depth in first_depth..=last_depth {
            let Some((best_move, score)) = self.search_root(&mut scratch, &moves, depth) else {
                break;
            };
            log::debug!(
                "depth {} best {} score {} nodes {}",
                depth,
                best_move,
                score,
                self.nodes_searched
            );
            completed = Some(SearchResult {
                best_move,
                score,
                depth,
                nodes: self.nodes_searched,
                elapsed: start.elapsed(),
            });

            // Search the previous best first next time round.
            if let Some(index) = moves.iter().position(|mv| *mv == best_move) {
                moves[..=index].rotate_right(1);
            }
            if is_mate_score(score) {
                break;
            }
        }

        if completed.is_none() {
            log::warn!("search stopped before depth {} finished", first_depth);
            completed = moves.first().map(|&best_move| SearchResult {
                best_move,
                score: 0,
                depth: 0,
                nodes: self.nodes_searched,
                elapsed: start.elapsed(),
            });
        }
        Ok(completed)
    }

    fn rank_root(&mut self, board: &Board, depth: u32) -> Result<Vec<ScoredMove>, EngineError> {
        board.validate()?;
        self.begin(None);
        let mut scratch = board.clone();

        let mut moves = self.move_generator.legal_moves(&scratch);
        order_moves(&mut moves);

        let mut ranked = Vec::with_capacity(moves.len());
        for mv in moves {
            let undo = scratch.make_move(mv);
            let score = -self.negamax(&mut scratch, depth - 1, 1, -INFINITY, INFINITY);
            scratch.unmake_move(undo);
            if self.aborted {
                break;
            }
            ranked.push(ScoredMove { mv, score });
        }
        ranked.sort_by_key(|scored| std::cmp::Reverse(scored.score));
        Ok(ranked)
    }

    fn begin(&mut self, deadline: Option<Instant>) {
        self.nodes_searched = 0;
        self.deadline = deadline;
        self.aborted = false;
    }

    /// A stop raised before the search began still counts; it is only
    /// lowered once the search returns.
    fn finish(&mut self) {
        self.deadline = None;
        self.stop.store(false, Ordering::Relaxed);
    }

    fn should_stop(&mut self) -> bool {
        if !self.aborted {
            let expired = self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
            if expired || self.stop.load(Ordering::Relaxed) {
                self.aborted = true;
            }
        }
        self.aborted
    }

    /// `None` if the search was cut short.
    fn search_root(&mut self, board: &mut Board, moves: &[Move], depth: u32) -> Option<(Move, i32)> {
        let mut alpha = -INFINITY;
        let mut best: Option<(Move, i32)> = None;

        for &mv in moves {
            let undo = board.make_move(mv);
            let score = -self.negamax(board, depth - 1, 1, -INFINITY, -alpha);
            board.unmake_move(undo);
            if self.aborted {
                return None;
            }
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((mv, score));
            }
            alpha = alpha.max(score);
        }
        best
    }

    fn negamax(&mut self, board: &mut Board, depth: u32, ply: u32, mut alpha: i32, beta: i32) -> i32 {
        self.nodes_searched += 1;
        if self.should_stop() {
            return 0;
        }

        let mut moves = self.move_generator.legal_moves(board);
        if moves.is_empty() {
            return if self.move_generator.is_in_check(board, board.side_to_move) {
                -(MATE_SCORE - ply as i32)
            } else {
                0
            };
        }

        if depth == 0 {
            return self.quiescence_search(board, alpha, beta, 0);
        }

        order_moves(&mut moves);

        let mut best_score = -INFINITY;
        for mv in moves {
            let undo = board.make_move(mv);
            let score = -self.negamax(board, depth - 1, ply + 1, -beta, -alpha);
            board.unmake_move(undo);
            if self.aborted {
                return 0;
            }

            best_score = best_score.max(score);
            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
        }
        best_score
    }

    fn quiescence_search(&mut self, board: &mut Board, mut alpha: i32, beta: i32, qply: u32) -> i32 {
        self.nodes_searched += 1;
        if self.should_stop() {
            return 0;
        }

        let stand_pat = self.evaluator.evaluate(board, board.side_to_move);
        if qply >= self.limits.quiescence_depth || stand_pat >= beta {
            return stand_pat;
        }
        alpha = alpha.max(stand_pat);

        let mut captures: Vec<Move> = self
            .move_generator
            .legal_moves(board)
            .into_iter()
            .filter(Move::is_capture)
            .collect();
        order_moves(&mut captures);

        for mv in captures {
            if stand_pat + capture_gain(&mv) + DELTA_MARGIN <= alpha {
                continue;
            }
            let undo = board.make_move(mv);
            let score = -self.quiescence_search(board, -beta, -alpha, qply + 1);
            board.unmake_move(undo);
            if self.aborted {
                return 0;
            }

            if score >= beta {
                return score;
            }
            alpha = alpha.max(score);
        }
        alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Color, Square};

    fn board(fen: &str) -> Board {
        Board::from_fen(fen).unwrap()
    }

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn test_captures_ordered_before_quiet_moves() {
        let position = board("4k3/8/8/3q4/2P1r3/3N4/8/4K3 w - - 0 1");
        let mut moves = MoveGenerator::new().legal_moves(&position);
        order_moves(&mut moves);

        let first_quiet = moves.iter().position(|mv| !mv.is_capture()).unwrap();
        assert!(moves[..first_quiet].iter().all(Move::is_capture));
        assert!(moves[first_quiet..].iter().all(|mv| !mv.is_capture()));
        // Pawn takes queen beats knight takes rook.
        assert_eq!(moves[0].from, sq("c4"));
        assert_eq!(moves[0].to, sq("d5"));
    }

    #[test]
    fn test_finds_back_rank_mate() {
        let position = board("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
        let mut search = Search::with_limits(SearchLimits::fixed_depth(2), StyleWeights::default());
        let result = search.find_best_move(&position).unwrap().unwrap();
        assert_eq!(result.best_move.to, sq("a8"));
        assert!(is_mate_score(result.score));
        assert_eq!(result.score, MATE_SCORE - 1);
    }

    #[test]
    fn test_checkmated_root_returns_none() {
        let position = board("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1");
        let mut search = Search::new();
        assert_eq!(search.find_best_move(&position).unwrap(), None);
    }

    #[test]
    fn test_stalemate_root_returns_none() {
        let position = board("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        let mut search = Search::new();
        assert_eq!(search.find_best_move(&position).unwrap(), None);
        assert!(search.rank_moves(&position, 2).unwrap().is_empty());
    }

    #[test]
    fn test_prefers_faster_mate() {
        // Mate in one is available alongside slower wins.
        let position = board("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
        let mut search = Search::with_limits(SearchLimits::fixed_depth(3), StyleWeights::default());
        let result = search.find_best_move(&position).unwrap().unwrap();
        assert_eq!(result.score, MATE_SCORE - 1);
        assert_eq!(result.best_move.to, sq("a8"));
    }

    #[test]
    fn test_takes_hanging_rook() {
        let position = board("4k3/8/8/3r4/8/8/3Q4/4K3 w - - 0 1");
        let mut search = Search::with_limits(SearchLimits::fixed_depth(2), StyleWeights::default());
        let result = search.find_best_move(&position).unwrap().unwrap();
        assert_eq!(result.best_move.to, sq("d5"));
    }

    #[test]
    fn test_quiescence_sees_recapture() {
        // Qxd5 loses the queen to the pawn on e6; a one-ply search must notice.
        let position = board("4k3/8/4p3/3r4/8/8/3Q4/4K3 w - - 0 1");
        let mut search = Search::with_limits(SearchLimits::fixed_depth(1), StyleWeights::default());
        let result = search.find_best_move(&position).unwrap().unwrap();
        assert_ne!(result.best_move.to, sq("d5"));
    }

    #[test]
    fn test_same_position_same_score() {
        let position = Board::new();
        let mut first = Search::with_limits(SearchLimits::fixed_depth(2), StyleWeights::default());
        let mut second = Search::with_limits(SearchLimits::fixed_depth(2), StyleWeights::default());
        let a = first.find_best_move(&position).unwrap().unwrap();
        let b = second.find_best_move(&position).unwrap().unwrap();
        let again = first.find_best_move(&position).unwrap().unwrap();
        assert_eq!(a.score, b.score);
        assert_eq!(a.score, again.score);
        assert_eq!(a.best_move, again.best_move);
    }

    #[test]
    fn test_search_leaves_board_untouched() {
        let position = board("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let copy = position.clone();
        let mut search = Search::with_limits(SearchLimits::fixed_depth(1), StyleWeights::default());
        search.find_best_move(&position).unwrap();
        assert_eq!(position, copy);
    }

    #[test]
    fn test_time_bounded_search_returns_legal_move() {
        let position = Board::new();
        let mut search = Search::with_limits(
            SearchLimits::timed(8, Duration::from_millis(200)),
            StyleWeights::default(),
        );
        let result = search.find_best_move(&position).unwrap().unwrap();
        assert!(MoveGenerator::new().legal_moves(&position).contains(&result.best_move));
        assert!(result.depth >= 1);
        assert!(result.depth < 8);
    }

    #[test]
    fn test_iterative_deepening_stops_on_mate() {
        let position = board("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
        let mut search = Search::new();
        let result = search
            .iterative_deepening(&position, 6, Duration::from_secs(30))
            .unwrap()
            .unwrap();
        assert_eq!(result.best_move.to, sq("a8"));
        assert_eq!(result.depth, 1);
    }

    #[test]
    fn test_stop_raised_before_start_is_honoured_once() {
        let position = board("4k3/8/8/3r4/8/8/3Q4/4K3 w - - 0 1");
        let mut search = Search::with_limits(SearchLimits::fixed_depth(2), StyleWeights::default());
        search.stop_handle().store(true, Ordering::Relaxed);
        let stopped = search.find_best_move(&position).unwrap().unwrap();
        assert_eq!(stopped.depth, 0);
        assert!(!search.stop_handle().load(Ordering::Relaxed));

        let result = search.find_best_move(&position).unwrap().unwrap();
        assert_eq!(result.depth, 2);
        assert_eq!(result.best_move.to, sq("d5"));
    }

    #[test]
    fn test_stop_mid_search_keeps_last_completed_depth() {
        let position = board("4k3/8/8/3r4/8/8/3Q4/4K3 w - - 0 1");
        let mut search = Search::new();
        let stop = search.stop_handle();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            stop.store(true, Ordering::Relaxed);
        });
        let stopped = search
            .iterative_deepening(&position, 64, Duration::from_secs(600))
            .unwrap()
            .unwrap();
        stopper.join().unwrap();
        assert!(stopped.depth >= 1 && stopped.depth < 64);

        let mut fixed = Search::new();
        let reference = fixed.search_depth(&position, stopped.depth).unwrap().unwrap();
        assert_eq!(stopped.best_move, reference.best_move);
        assert_eq!(stopped.score, reference.score);
    }

    #[test]
    fn test_deadline_keeps_last_completed_depth() {
        let position = board("4k3/8/8/3r4/8/8/3Q4/4K3 w - - 0 1");
        let mut search = Search::new();
        let timed = search
            .iterative_deepening(&position, 64, Duration::from_millis(300))
            .unwrap()
            .unwrap();
        assert!(timed.depth >= 1 && timed.depth < 64);

        let reference = Search::new().search_depth(&position, timed.depth).unwrap().unwrap();
        assert_eq!(timed.best_move, reference.best_move);
        assert_eq!(timed.score, reference.score);
    }

    #[test]
    fn test_quiescence_cap_returns_stand_pat() {
        let mut position = board("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1");
        let limits = SearchLimits {
            quiescence_depth: 0,
            ..SearchLimits::default()
        };
        let mut capped = Search::with_limits(limits, StyleWeights::default());
        capped.begin(None);
        let stand_pat = capped.evaluator.evaluate(&position, Color::White);
        assert_eq!(capped.quiescence_search(&mut position, -INFINITY, INFINITY, 0), stand_pat);
        assert_eq!(capped.get_nodes_searched(), 1);

        let mut open = Search::new();
        open.begin(None);
        open.quiescence_search(&mut position, -INFINITY, INFINITY, 0);
        assert!(open.get_nodes_searched() > 1);
    }

    #[test]
    fn test_delta_pruning_skips_hopeless_capture() {
        let mut position = board("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1");
        let mut search = Search::new();
        let stand_pat = search.evaluator.evaluate(&position, Color::White);

        // Winning a pawn cannot lift the score to alpha.
        let alpha = stand_pat + PieceKind::Pawn.value() + DELTA_MARGIN;
        search.begin(None);
        let score = search.quiescence_search(&mut position, alpha, alpha + 1, 0);
        assert_eq!(score, alpha);
        assert_eq!(search.get_nodes_searched(), 1);

        search.begin(None);
        search.quiescence_search(&mut position, stand_pat - 1, stand_pat + 1_000, 0);
        assert!(search.get_nodes_searched() > 1);
    }

    #[test]
    fn test_rank_moves_is_sorted() {
        let position = board("4k3/8/8/3r4/8/8/3Q4/4K3 w - - 0 1");
        let mut search = Search::new();
        let ranked = search.rank_moves(&position, 2).unwrap();
        assert_eq!(ranked.len(), MoveGenerator::new().legal_moves(&position).len());
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranked[0].mv.to, sq("d5"));
    }

    #[test]
    fn test_malformed_board_is_rejected() {
        let mut position = Board::new();
        position.take(sq("e1"));
        let mut search = Search::new();
        assert_eq!(
            search.find_best_move(&position),
            Err(EngineError::MissingKing(Color::White))
        );
    }
}
