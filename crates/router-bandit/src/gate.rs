//! Feature quality gate.
//!
//! Scores how trustworthy a feature vector is for contextual selection.
//! The score is a heuristic admission control, not a probability: the
//! hybrid router compares it against a configured minimum to decide
//! between contextual selection and the classical fallback.

/// Heuristic scorer for feature vector fitness.
#[derive(Debug, Clone)]
pub struct FeatureQualityGate {
    dimension: usize,
    min_norm: f64,
    max_norm: f64,
}

impl FeatureQualityGate {
    /// Create a gate for the given dimension and norm bounds
    #[must_use]
    pub fn new(dimension: usize, min_norm: f64, max_norm: f64) -> Self {
        Self {
            dimension,
            min_norm,
            max_norm,
        }
    }

    /// Score a feature vector in [0, 1].
    ///
    /// Absent or wrong-dimension features score 0.0. Non-finite
    /// components apply a 0.7 validity penalty and are excluded from
    /// the norm. Norms outside the configured bounds apply a penalty
    /// scaling linearly up to half the score.
    pub fn score(&self, features: Option<&[f64]>) -> f64 {
        let Some(features) = features else {
            return 0.0;
        };
        if features.len() != self.dimension {
            return 0.0;
        }

        let mut score = 1.0;

        let finite_count = features.iter().filter(|x| x.is_finite()).count();
        if finite_count != features.len() {
            score *= 0.7;
        }

        let norm = features
            .iter()
            .filter(|x| x.is_finite())
            .map(|x| x * x)
            .sum::<f64>()
            .sqrt();

        if norm < self.min_norm && self.min_norm > 0.0 {
            let shortfall = (self.min_norm - norm) / self.min_norm;
            score *= 1.0 - 0.5 * shortfall;
        } else if norm > self.max_norm && self.max_norm > 0.0 {
            let excess = ((norm - self.max_norm) / self.max_norm).min(1.0);
            score *= 1.0 - 0.5 * excess;
        }

        score.clamp(0.0, 1.0)
    }
}
