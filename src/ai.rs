use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::board::Color;
use crate::config::{SearchLimits, StyleWeights};
use crate::game::Game;
use crate::movegen::Move;
use crate::search::{ScoredMove, Search};

const HINT_DEPTH: u32 = 3;
/// How many of the best-ranked moves a deliberately weak pick chooses from,
/// the best one excluded.
const SUBOPTIMAL_POOL: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner = 1,
    Casual = 2,
    Intermediate = 3,
    Advanced = 4,
    Master = 5,
}

/// Search parameters and randomness for one difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierProfile {
    pub depth: u32,
    /// Chance of ignoring the search and playing any legal move.
    pub random_chance: f64,
    /// Chance of playing one of the next best moves instead of the best.
    pub suboptimal_chance: f64,
    pub time_budget: Option<Duration>,
}

impl Difficulty {
    /// Out of range levels are clamped to 1..=5.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 | 1 => Difficulty::Beginner,
            2 => Difficulty::Casual,
            3 => Difficulty::Intermediate,
            4 => Difficulty::Advanced,
            _ => Difficulty::Master,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn profile(self) -> TierProfile {
        match self {
            Difficulty::Beginner => TierProfile {
                depth: 1,
                random_chance: 0.5,
                suboptimal_chance: 0.3,
                time_budget: None,
            },
            Difficulty::Casual => TierProfile {
                depth: 2,
                random_chance: 0.2,
                suboptimal_chance: 0.3,
                time_budget: None,
            },
            Difficulty::Intermediate => TierProfile {
                depth: 3,
                random_chance: 0.0,
                suboptimal_chance: 0.15,
                time_budget: None,
            },
            Difficulty::Advanced => TierProfile {
                depth: 4,
                random_chance: 0.0,
                suboptimal_chance: 0.0,
                time_budget: None,
            },
            Difficulty::Master => TierProfile {
                depth: 6,
                random_chance: 0.0,
                suboptimal_chance: 0.0,
                time_budget: Some(Duration::from_secs(2)),
            },
        }
    }
}

/// Computer opponent. It only ever reads the game; the caller applies the
/// returned move.
pub struct AiController<R: Rng = StdRng> {
    rng: R,
    search: Search,
    hint_depth: u32,
    sabotage_remaining: u32,
}

impl AiController<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> AiController<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            search: Search::new(),
            hint_depth: HINT_DEPTH,
            sabotage_remaining: 0,
        }
    }

    pub fn set_style(&mut self, style: StyleWeights) {
        self.search.set_style(style);
    }

    pub fn set_hint_depth(&mut self, depth: u32) {
        self.hint_depth = depth.max(1);
    }

    /// The next `count` calls to [`AiController::choose_move`] skip the
    /// search and play a random legal move.
    pub fn sabotage(&mut self, count: u32) {
        self.sabotage_remaining = count;
    }

    pub fn sabotage_remaining(&self) -> u32 {
        self.sabotage_remaining
    }

    /// Picks a move for `color`. `None` when it is not that side's turn, a
    /// promotion is waiting for a choice, or the game is over.
    pub fn choose_move(&mut self, game: &Game, color: Color, difficulty: Difficulty) -> Option<Move> {
        if game.turn() != color {
            log::warn!("asked to move for {} while {} is to move", color, game.turn());
            return None;
        }
        let legal = game.legal_moves();
        if legal.is_empty() {
            return None;
        }

        if self.sabotage_remaining > 0 {
            self.sabotage_remaining -= 1;
            log::info!("sabotaged move for {}, {} left", color, self.sabotage_remaining);
            return self.random_move(&legal);
        }

        let profile = difficulty.profile();
        if self.rng.gen_bool(profile.random_chance) {
            log::info!("{} plays a random move at level {}", color, difficulty.level());
            return self.random_move(&legal);
        }

        self.search.set_limits(SearchLimits {
            max_depth: profile.depth,
            time_budget_ms: profile.time_budget.map(|budget| budget.as_millis() as u64),
            ..SearchLimits::default()
        });

        if self.rng.gen_bool(profile.suboptimal_chance) {
            return match self.search.rank_moves(game.board(), profile.depth) {
                Ok(ranked) => {
                    let pool = if ranked.len() > 1 {
                        &ranked[1..ranked.len().min(SUBOPTIMAL_POOL + 1)]
                    } else {
                        &ranked[..]
                    };
                    let pick = pool.choose(&mut self.rng).map(|scored| scored.mv);
                    log::info!("{} plays a weaker move at level {}", color, difficulty.level());
                    pick.or_else(|| self.random_move(&legal))
                }
                Err(e) => {
                    log::warn!("ranking failed, playing a random move: {}", e);
                    self.random_move(&legal)
                }
            };
        }

        match self.search.find_best_move(game.board()) {
            Ok(Some(result)) => {
                log::info!(
                    "{} plays {} (score {}, depth {}, {} nodes)",
                    color,
                    result.best_move,
                    result.score,
                    result.depth,
                    result.nodes
                );
                Some(result.best_move)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("search failed, playing a random move: {}", e);
                self.random_move(&legal)
            }
        }
    }

    /// Every legal move for `color` scored at the hint depth, best first.
    pub fn get_hint(&mut self, game: &Game, color: Color) -> Vec<ScoredMove> {
        if game.turn() != color || game.legal_moves().is_empty() {
            return Vec::new();
        }
        match self.search.rank_moves(game.board(), self.hint_depth) {
            Ok(ranked) => ranked,
            Err(e) => {
                log::warn!("hint search failed: {}", e);
                Vec::new()
            }
        }
    }

    fn random_move(&mut self, legal: &[Move]) -> Option<Move> {
        legal.choose(&mut self.rng).copied()
    }
}
