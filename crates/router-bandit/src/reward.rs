//! Reward normalization.
//!
//! Folds an execution outcome's quality, latency, and cost signals into
//! the single scalar reward in [0, 1] that the bandits learn from.
//! Callers run this before `update`.

use router_core::{RouterError, RouterResult};
use serde::{Deserialize, Serialize};

/// Configuration for reward normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Weight of the quality signal
    pub quality_weight: f64,
    /// Weight of the latency signal
    pub latency_weight: f64,
    /// Weight of the cost signal
    pub cost_weight: f64,
    /// Latency at or beyond which the latency score reaches zero
    pub max_latency_ms: f64,
    /// Cost at or beyond which the cost score reaches zero
    pub max_cost: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            quality_weight: 0.6,
            latency_weight: 0.2,
            cost_weight: 0.2,
            max_latency_ms: 30_000.0,
            max_cost: 1.0,
        }
    }
}

impl RewardConfig {
    /// Create a configuration with default weights (0.6/0.2/0.2)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal weights
    #[must_use]
    pub fn with_weights(mut self, quality: f64, latency: f64, cost: f64) -> Self {
        self.quality_weight = quality;
        self.latency_weight = latency;
        self.cost_weight = cost;
        self
    }

    /// Set the latency and cost scales
    #[must_use]
    pub fn with_scales(mut self, max_latency_ms: f64, max_cost: f64) -> Self {
        self.max_latency_ms = max_latency_ms;
        self.max_cost = max_cost;
        self
    }

    /// Validate weights and scales.
    ///
    /// # Errors
    /// Returns a configuration error for non-finite or non-positive
    /// values where positivity is required.
    pub fn validate(&self) -> RouterResult<()> {
        let weights = [self.quality_weight, self.latency_weight, self.cost_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RouterError::configuration(
                "reward weights must be finite and non-negative",
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(RouterError::configuration(
                "at least one reward weight must be positive",
            ));
        }
        if !(self.max_latency_ms > 0.0 && self.max_latency_ms.is_finite()) {
            return Err(RouterError::configuration(
                "max_latency_ms must be finite and positive",
            ));
        }
        if !(self.max_cost > 0.0 && self.max_cost.is_finite()) {
            return Err(RouterError::configuration(
                "max_cost must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// Deterministic quality/latency/cost → reward mapping.
#[derive(Debug, Clone)]
pub struct RewardNormalizer {
    config: RewardConfig,
}

impl RewardNormalizer {
    /// Create a normalizer with default weights
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RewardConfig::default(),
        }
    }

    /// Create a normalizer with an explicit configuration.
    ///
    /// # Errors
    /// Returns a configuration error if the configuration is invalid.
    pub fn with_config(config: RewardConfig) -> RouterResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Compute the blended reward in [0, 1].
    ///
    /// Quality is clamped into [0, 1]; latency and cost map through
    /// `max(0, 1 - value / scale)`. Non-finite quality counts as zero;
    /// non-finite latency or cost score zero (worst case).
    pub fn compute(&self, quality: f64, latency_ms: f64, cost: f64) -> f64 {
        let quality_score = if quality.is_finite() {
            quality.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let latency_score = if latency_ms.is_finite() {
            (1.0 - latency_ms.max(0.0) / self.config.max_latency_ms).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let cost_score = if cost.is_finite() {
            (1.0 - cost.max(0.0) / self.config.max_cost).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let weight_sum =
            self.config.quality_weight + self.config.latency_weight + self.config.cost_weight;
        let blended = (self.config.quality_weight * quality_score
            + self.config.latency_weight * latency_score
            + self.config.cost_weight * cost_score)
            / weight_sum;
        blended.clamp(0.0, 1.0)
    }
}

impl Default for RewardNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_outcome_scores_one() {
        let normalizer = RewardNormalizer::new();
        assert!((normalizer.compute(1.0, 0.0, 0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_worst_outcome_scores_zero() {
        let normalizer = RewardNormalizer::new();
        let reward = normalizer.compute(0.0, 1e12, 1e12);
        assert!((reward - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_result_always_bounded() {
        let normalizer = RewardNormalizer::new();
        for (quality, latency, cost) in [
            (5.0, -10.0, -3.0),
            (-1.0, 0.0, 0.0),
            (f64::NAN, f64::INFINITY, f64::NEG_INFINITY),
            (0.5, 15_000.0, 0.5),
        ] {
            let reward = normalizer.compute(quality, latency, cost);
            assert!((0.0..=1.0).contains(&reward), "reward {reward} out of range");
        }
    }

    #[test]
    fn test_monotonic_in_each_signal() {
        let normalizer = RewardNormalizer::new();
        assert!(normalizer.compute(0.9, 100.0, 0.1) > normalizer.compute(0.5, 100.0, 0.1));
        assert!(normalizer.compute(0.5, 100.0, 0.1) > normalizer.compute(0.5, 20_000.0, 0.1));
        assert!(normalizer.compute(0.5, 100.0, 0.1) > normalizer.compute(0.5, 100.0, 0.9));
    }

    #[test]
    fn test_deterministic() {
        let normalizer = RewardNormalizer::new();
        let first = normalizer.compute(0.7, 850.0, 0.02);
        let second = normalizer.compute(0.7, 850.0, 0.02);
        assert!((first - second).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_weights_are_normalized() {
        let config = RewardConfig::new().with_weights(2.0, 1.0, 1.0);
        let normalizer = RewardNormalizer::with_config(config).unwrap();
        // Weights 2/1/1 behave like 0.5/0.25/0.25
        let reward = normalizer.compute(1.0, 1e12, 1e12);
        assert!((reward - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(RewardNormalizer::with_config(RewardConfig::new().with_weights(0.0, 0.0, 0.0))
            .is_err());
        assert!(
            RewardNormalizer::with_config(RewardConfig::new().with_scales(0.0, 1.0)).is_err()
        );
        assert!(RewardNormalizer::with_config(
            RewardConfig::new().with_weights(f64::NAN, 0.2, 0.2)
        )
        .is_err());
    }
}
