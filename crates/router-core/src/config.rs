//! Router configuration.

use crate::error::{RouterError, RouterResult};
use serde::{Deserialize, Serialize};

/// Operating mode for the hybrid router.
///
/// A single three-state enum replaces independent contextual/hybrid
/// boolean flags so the gating logic has no ambiguous combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterMode {
    /// Always use the classical (Thompson Sampling) bandit
    ClassicalOnly,
    /// Always use the contextual (LinUCB) bandit; malformed features
    /// are a configuration error rather than a silent fallback
    ContextualOnly,
    /// Use the contextual bandit when feature quality admits it,
    /// otherwise fall back to the classical bandit
    Hybrid,
}

/// Configuration for the hybrid router and its selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Feature vector dimension. Matrix operations are O(d^2)-O(d^3),
    /// so keep this small
    pub dimension: usize,
    /// LinUCB exploration constant. Higher values explore more
    pub exploration_alpha: f64,
    /// Total trials per task before Thompson Sampling leaves the
    /// uniform-random cold-start phase
    pub cold_start_trials: u64,
    /// Minimum feature quality score admitted to contextual selection
    pub feature_quality_min: f64,
    /// Lower bound on the feature vector L2 norm before quality penalties
    pub min_norm: f64,
    /// Upper bound on the feature vector L2 norm before quality penalties
    pub max_norm: f64,
    /// Operating mode
    pub mode: RouterMode,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            dimension: 10,
            exploration_alpha: 1.0,
            cold_start_trials: 10,
            feature_quality_min: 0.5,
            min_norm: 0.1,
            max_norm: 100.0,
            mode: RouterMode::Hybrid,
        }
    }
}

impl RouterConfig {
    /// Create a new configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the feature dimension
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the exploration constant
    #[must_use]
    pub fn with_exploration_alpha(mut self, alpha: f64) -> Self {
        self.exploration_alpha = alpha;
        self
    }

    /// Set the cold-start trial count
    #[must_use]
    pub fn with_cold_start_trials(mut self, trials: u64) -> Self {
        self.cold_start_trials = trials;
        self
    }

    /// Set the minimum feature quality score
    #[must_use]
    pub fn with_feature_quality_min(mut self, min: f64) -> Self {
        self.feature_quality_min = min;
        self
    }

    /// Set the feature norm bounds
    #[must_use]
    pub fn with_norm_bounds(mut self, min_norm: f64, max_norm: f64) -> Self {
        self.min_norm = min_norm;
        self.max_norm = max_norm;
        self
    }

    /// Set the operating mode
    #[must_use]
    pub fn with_mode(mut self, mode: RouterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `RouterError::InvalidDimension` for a zero dimension and
    /// `RouterError::Configuration` for out-of-range thresholds.
    pub fn validate(&self) -> RouterResult<()> {
        if self.dimension == 0 {
            return Err(RouterError::InvalidDimension(self.dimension));
        }
        if !self.exploration_alpha.is_finite() || self.exploration_alpha < 0.0 {
            return Err(RouterError::configuration(format!(
                "exploration_alpha must be finite and non-negative, got {}",
                self.exploration_alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.feature_quality_min) {
            return Err(RouterError::configuration(format!(
                "feature_quality_min must be in [0, 1], got {}",
                self.feature_quality_min
            )));
        }
        if !(self.min_norm >= 0.0 && self.max_norm > self.min_norm) {
            return Err(RouterError::configuration(format!(
                "norm bounds must satisfy 0 <= min_norm < max_norm, got [{}, {}]",
                self.min_norm, self.max_norm
            )));
        }
        Ok(())
    }
}
