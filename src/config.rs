use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    pub max_depth: u32,
    /// Wall-clock budget. When set, the search deepens iteratively up to
    /// `max_depth` until the budget runs out.
    pub time_budget_ms: Option<u64>,
    /// Hard cap on capture-only plies past the horizon.
    pub quiescence_depth: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_depth: 4,
            time_budget_ms: None,
            quiescence_depth: 6,
        }
    }
}

impl SearchLimits {
    pub fn fixed_depth(depth: u32) -> Self {
        Self {
            max_depth: depth,
            ..Self::default()
        }
    }

    pub fn timed(max_depth: u32, budget: Duration) -> Self {
        Self {
            max_depth,
            time_budget_ms: Some(budget.as_millis() as u64),
            ..Self::default()
        }
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}

/// Per-term multipliers on the static evaluation. They change how positions
/// are scored, never which moves are legal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleWeights {
    pub material: f32,
    pub positional: f32,
    pub mobility: f32,
    pub king_safety: f32,
    pub pawn_structure: f32,
}

impl Default for StyleWeights {
    fn default() -> Self {
        Self::balanced()
    }
}

impl StyleWeights {
    pub fn balanced() -> Self {
        Self {
            material: 1.0,
            positional: 1.0,
            mobility: 1.0,
            king_safety: 1.0,
            pawn_structure: 1.0,
        }
    }

    pub fn aggressive() -> Self {
        Self {
            mobility: 1.5,
            king_safety: 0.7,
            ..Self::balanced()
        }
    }

    pub fn defensive() -> Self {
        Self {
            mobility: 0.8,
            king_safety: 1.6,
            pawn_structure: 1.2,
            ..Self::balanced()
        }
    }

    pub fn positional() -> Self {
        Self {
            positional: 1.4,
            pawn_structure: 1.5,
            ..Self::balanced()
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "balanced" => Some(Self::balanced()),
            "aggressive" => Some(Self::aggressive()),
            "defensive" => Some(Self::defensive()),
            "positional" => Some(Self::positional()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Oldest entries are evicted past this length; they can no longer be
    /// undone. A snapshot only carries the entries still held, so after a
    /// reload the oldest one undoes to a board with no last move.
    pub history_limit: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { history_limit: 512 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_style_json_keeps_defaults() {
        let style: StyleWeights = serde_json::from_str(r#"{"mobility": 2.0}"#).unwrap();
        assert_eq!(style.mobility, 2.0);
        assert_eq!(style.material, 1.0);
        assert_eq!(style.king_safety, 1.0);
    }

    #[test]
    fn test_search_limits_budget() {
        let limits = SearchLimits::timed(6, Duration::from_millis(250));
        assert_eq!(limits.time_budget(), Some(Duration::from_millis(250)));
        assert_eq!(SearchLimits::fixed_depth(3).time_budget(), None);
        let parsed: SearchLimits = serde_json::from_str(r#"{"max_depth": 2}"#).unwrap();
        assert_eq!(parsed.quiescence_depth, 6);
    }

    #[test]
    fn test_style_presets() {
        assert_eq!(StyleWeights::by_name("balanced"), Some(StyleWeights::default()));
        assert!(StyleWeights::by_name("aggressive").unwrap().mobility > 1.0);
        assert!(StyleWeights::by_name("reckless").is_none());
    }
}
