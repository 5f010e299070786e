//! # Router Bandit
//!
//! Adaptive bandit engine for model routing.
//!
//! Given a request's feature context and a list of candidate execution
//! targets (models, providers, tools), the engine picks the candidate
//! expected to maximize a blended quality/latency/cost reward and
//! updates its belief online from observed outcomes. No external
//! training jobs, no I/O: pure in-process state transitions.
//!
//! This crate provides:
//! - [`LinUCBSelector`]: contextual bandit with per-arm ridge regression
//! - [`ThompsonSelector`]: context-free Beta-posterior bandit with a
//!   uniform cold-start phase
//! - [`HybridRouter`]: gates between the two on feature quality
//! - [`FeatureQualityGate`]: the admission heuristic behind that gate
//! - [`HashBucketExtractor`]: default context → feature-vector mapping
//! - [`RewardNormalizer`]: folds quality/latency/cost into one reward
//!
//! The embedding application owns candidate health filtering, executes
//! the chosen candidate, and serializes [`RouterState`] if it wants
//! durability. Single-writer access per router instance is the
//! caller's responsibility; nothing here blocks or suspends.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod feature;
pub mod gate;
pub mod hybrid;
pub mod linucb;
pub mod reward;
pub mod thompson;

mod linalg;

// Re-export main types
pub use feature::{FeatureExtractor, HashBucketExtractor};
pub use gate::FeatureQualityGate;
pub use hybrid::{HybridRouter, RouteContext, RouterState, RouterStats};
pub use linucb::{ContextualArm, LinUCBSelector};
pub use reward::{RewardConfig, RewardNormalizer};
pub use thompson::{BetaPosterior, ThompsonSelector};

// Re-export the core types callers need alongside the engine
pub use router_core::{Context, ContextValue, RouterConfig, RouterError, RouterMode, RouterResult};

/// Counter: selections served, labeled by `algorithm`
pub const METRIC_SELECTIONS: &str = "router_selections_total";
/// Counter: hybrid gate rejections that fell back to the classical bandit
pub const METRIC_FALLBACKS: &str = "router_fallbacks_total";
/// Counter: degraded-precision recoveries, labeled by `reason`
pub const METRIC_DEGENERATE_RECOVERIES: &str = "router_degenerate_recoveries_total";
/// Gauge: contextual arms currently tracked
pub const METRIC_CONTEXTUAL_ARMS: &str = "router_contextual_arms";

/// Clamp a caller-supplied reward into [0, 1]; non-finite counts as zero
pub(crate) fn clamp_reward(reward: f64) -> f64 {
    if reward.is_finite() {
        reward.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
