//! LinUCB contextual bandit.
//!
//! Each candidate owns a ridge-regression model:
//!
//! ```text
//!   A = I + Σ x xᵗ          (design matrix)
//!   b = Σ r x               (reward accumulator)
//!   θ = A⁻¹ b               (coefficient estimate)
//!   UCB(x) = xᵗθ + α √(xᵗ A⁻¹ x)
//! ```
//!
//! The inverse is maintained incrementally with the Sherman–Morrison
//! formula; numeric degeneracy triggers a full re-inversion, and a truly
//! singular matrix falls back to the identity so a routing decision is
//! always produced.

use crate::feature::fit_dimension;
use crate::{clamp_reward, linalg, METRIC_DEGENERATE_RECOVERIES, METRIC_SELECTIONS};
use router_core::{RouterError, RouterResult};
use router_telemetry::{MetricsSink, NoopSink};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-candidate ridge-regression state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextualArm {
    /// Design matrix A (d×d, row-major), initialized to identity
    a: Vec<f64>,
    /// Cached inverse of `a`; recomputed lazily after restore
    #[serde(skip)]
    a_inv: Option<Vec<f64>>,
    /// Reward accumulator b
    b: Vec<f64>,
    /// Feature dimension
    dimension: usize,
    /// Number of accepted updates
    updates: u64,
}

impl ContextualArm {
    fn new(dimension: usize) -> Self {
        Self {
            a: linalg::identity(dimension),
            a_inv: None,
            b: vec![0.0; dimension],
            dimension,
            updates: 0,
        }
    }

    /// Number of updates folded into this arm
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Feature dimension this arm was built for
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The design matrix A (row-major)
    pub fn design_matrix(&self) -> &[f64] {
        &self.a
    }

    /// The cached inverse, if one has been computed
    pub fn cached_inverse(&self) -> Option<&[f64]> {
        self.a_inv.as_deref()
    }

    /// The reward accumulator b
    pub fn reward_vector(&self) -> &[f64] {
        &self.b
    }

    /// Make sure `a_inv` holds a usable inverse.
    ///
    /// A singular design matrix degrades to the identity; this keeps
    /// routing alive at reduced precision and is surfaced through the
    /// degenerate-recovery counter rather than an error.
    fn ensure_inverse(&mut self, sink: &dyn MetricsSink) {
        if self.a_inv.is_some() {
            return;
        }
        let inverse = linalg::invert(&self.a, self.dimension).unwrap_or_else(|| {
            warn!(
                updates = self.updates,
                "singular design matrix, substituting identity"
            );
            sink.incr_counter(METRIC_DEGENERATE_RECOVERIES, &[("reason", "singular")]);
            linalg::identity(self.dimension)
        });
        self.a_inv = Some(inverse);
    }

    /// UCB score for a feature vector: mean estimate plus scaled
    /// confidence width
    fn ucb_score(&mut self, x: &[f64], alpha: f64, sink: &dyn MetricsSink) -> f64 {
        self.ensure_inverse(sink);
        let Some(a_inv) = self.a_inv.as_ref() else {
            return 0.0;
        };

        let theta = linalg::mat_vec_mul(a_inv, &self.b, self.dimension);
        let mean = linalg::dot(&theta, x);

        let a_inv_x = linalg::mat_vec_mul(a_inv, x, self.dimension);
        let confidence = linalg::dot(x, &a_inv_x).max(0.0).sqrt();

        mean + alpha * confidence
    }

    /// Rank-one update: `A += x xᵗ`, `b += reward x`, with the cached
    /// inverse maintained via Sherman–Morrison
    fn update(&mut self, x: &[f64], reward: f64, sink: &dyn MetricsSink) {
        let d = self.dimension;
        self.ensure_inverse(sink);

        // Sherman–Morrison terms from the pre-update inverse
        let (u, denominator) = match self.a_inv.as_ref() {
            Some(a_inv) => {
                let u = linalg::mat_vec_mul(a_inv, x, d);
                let denominator = 1.0 + linalg::dot(x, &u);
                (u, denominator)
            }
            None => (Vec::new(), 0.0),
        };

        for i in 0..d {
            for j in 0..d {
                self.a[i * d + j] += x[i] * x[j];
            }
        }
        for (b_i, &x_i) in self.b.iter_mut().zip(x.iter()) {
            *b_i += reward * x_i;
        }
        self.updates += 1;

        if denominator > 0.0 && denominator.is_finite() {
            if let Some(a_inv) = self.a_inv.as_mut() {
                for i in 0..d {
                    for j in 0..d {
                        a_inv[i * d + j] -= u[i] * u[j] / denominator;
                    }
                }
            }
        } else {
            // Degenerate denominator: recompute the inverse from the
            // updated design matrix instead of propagating NaN/Inf
            debug!(denominator, "Sherman-Morrison denominator degenerate, re-inverting");
            sink.incr_counter(
                METRIC_DEGENERATE_RECOVERIES,
                &[("reason", "sherman_morrison")],
            );
            self.a_inv = None;
            self.ensure_inverse(sink);
        }
    }
}

/// LinUCB selector over a dynamic set of candidate arms.
///
/// Arms are created lazily the first time a candidate identifier is
/// seen in `select` or `update` and live for the process lifetime.
pub struct LinUCBSelector {
    dimension: usize,
    alpha: f64,
    arms: HashMap<String, ContextualArm>,
    sink: Arc<dyn MetricsSink>,
}

impl LinUCBSelector {
    /// Create a selector with the given feature dimension and
    /// exploration constant.
    ///
    /// # Errors
    /// Returns `RouterError::InvalidDimension` for a zero dimension.
    pub fn new(dimension: usize, alpha: f64) -> RouterResult<Self> {
        if dimension == 0 {
            return Err(RouterError::InvalidDimension(dimension));
        }
        Ok(Self {
            dimension,
            alpha,
            arms: HashMap::new(),
            sink: Arc::new(NoopSink),
        })
    }

    /// Attach a metrics sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Select the candidate with the highest UCB score.
    ///
    /// Features shorter than the configured dimension are right-padded
    /// with zeros, longer ones truncated. Ties keep the earliest
    /// candidate in the supplied order.
    ///
    /// # Errors
    /// Returns `RouterError::EmptyCandidates` for an empty candidate list.
    pub fn select(&mut self, candidates: &[&str], features: &[f64]) -> RouterResult<String> {
        if candidates.is_empty() {
            return Err(RouterError::EmptyCandidates);
        }
        let x = fit_dimension(features, self.dimension);

        let mut best: Option<(&str, f64)> = None;
        for &candidate in candidates {
            let arm = self
                .arms
                .entry(candidate.to_string())
                .or_insert_with(|| ContextualArm::new(self.dimension));
            let score = arm.ucb_score(&x, self.alpha, self.sink.as_ref());
            match best {
                None => best = Some((candidate, score)),
                Some((_, best_score)) if score > best_score => best = Some((candidate, score)),
                Some(_) => {}
            }
        }

        self.sink
            .incr_counter(METRIC_SELECTIONS, &[("algorithm", "linucb")]);
        let Some((chosen, _)) = best else {
            return Err(RouterError::EmptyCandidates);
        };
        Ok(chosen.to_string())
    }

    /// Fold an observed reward into a candidate's arm.
    ///
    /// The reward is clamped into [0, 1]; non-finite rewards count as
    /// zero. Updating a never-selected candidate creates a fresh arm
    /// and applies the update to it.
    pub fn update(&mut self, candidate: &str, reward: f64, features: &[f64]) {
        let reward = clamp_reward(reward);
        let x = fit_dimension(features, self.dimension);
        let arm = self
            .arms
            .entry(candidate.to_string())
            .or_insert_with(|| ContextualArm::new(self.dimension));
        arm.update(&x, reward, self.sink.as_ref());
    }

    /// Look up the arm for a candidate
    pub fn arm(&self, candidate: &str) -> Option<&ContextualArm> {
        self.arms.get(candidate)
    }

    /// Number of arms created so far
    pub fn arm_count(&self) -> usize {
        self.arms.len()
    }

    /// All arms, keyed by candidate identifier
    pub fn arms(&self) -> &HashMap<String, ContextualArm> {
        &self.arms
    }

    /// Drop all learned state
    pub fn reset(&mut self) {
        self.arms.clear();
    }

    /// Replace the arm set from a snapshot.
    ///
    /// # Errors
    /// Returns a configuration error if any arm's dimension differs
    /// from the selector's.
    pub(crate) fn restore_arms(
        &mut self,
        arms: HashMap<String, ContextualArm>,
    ) -> RouterResult<()> {
        for (candidate, arm) in &arms {
            if arm.dimension != self.dimension || arm.a.len() != self.dimension * self.dimension {
                return Err(RouterError::configuration(format!(
                    "snapshot arm '{candidate}' has dimension {}, selector expects {}",
                    arm.dimension, self.dimension
                )));
            }
        }
        self.arms = arms;
        Ok(())
    }
}

impl std::fmt::Debug for LinUCBSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinUCBSelector")
            .field("dimension", &self.dimension)
            .field("alpha", &self.alpha)
            .field("arms", &self.arms.len())
            .finish()
    }
}
