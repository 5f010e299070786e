//! Hybrid router composing the contextual and classical bandits.
//!
//! One gating function, driven by [`RouterMode`], decides per call
//! which selector handles a request. `update` runs the same gate so
//! feedback always lands in the algorithm that produced the matching
//! selection; it is never silently dropped.

use crate::feature::{FeatureExtractor, HashBucketExtractor};
use crate::gate::FeatureQualityGate;
use crate::linucb::{ContextualArm, LinUCBSelector};
use crate::thompson::{BetaPosterior, ThompsonSelector};
use crate::{METRIC_CONTEXTUAL_ARMS, METRIC_FALLBACKS};
use router_core::{Context, RouterConfig, RouterError, RouterMode, RouterResult};
use router_telemetry::{MetricsSink, NoopSink};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Task identifier used when the caller supplies none
const DEFAULT_TASK: &str = "default";

/// Context supplied with a routing request.
#[derive(Debug, Clone, Copy)]
pub enum RouteContext<'a> {
    /// No request context; classical selection only
    Empty,
    /// A pre-extracted feature vector
    Features(&'a [f64]),
    /// A raw key/value context, run through the feature extractor
    Map(&'a Context),
}

impl<'a> RouteContext<'a> {
    fn feature_len(&self) -> Option<usize> {
        match self {
            Self::Features(features) => Some(features.len()),
            Self::Empty | Self::Map(_) => None,
        }
    }
}

impl<'a> From<&'a [f64]> for RouteContext<'a> {
    fn from(features: &'a [f64]) -> Self {
        Self::Features(features)
    }
}

impl<'a> From<&'a Context> for RouteContext<'a> {
    fn from(context: &'a Context) -> Self {
        Self::Map(context)
    }
}

/// Which underlying selector handles a call
enum Delegate {
    Contextual(Vec<f64>),
    Classical,
}

/// Serializable snapshot of all learned router state.
///
/// The router defines no persistence of its own; embedders that want
/// durability serialize this aggregate between processes and restore
/// it before first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterState {
    /// Configuration the state was learned under
    pub config: RouterConfig,
    /// Contextual arms keyed by candidate identifier
    pub arms: HashMap<String, ContextualArm>,
    /// Beta posteriors keyed by task, then candidate
    pub posteriors: HashMap<String, HashMap<String, BetaPosterior>>,
}

/// Point-in-time operational counters.
#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    /// Selections served since construction or reset
    pub rounds: u64,
    /// Gate rejections that fell back to the classical bandit
    pub fallbacks: u64,
    /// Contextual arms created so far
    pub contextual_arms: usize,
    /// Tasks with classical posterior state
    pub tasks: usize,
    /// Per-candidate contextual update counts
    pub arm_updates: HashMap<String, u64>,
}

/// Adaptive selector gating between LinUCB and Thompson Sampling.
pub struct HybridRouter {
    config: RouterConfig,
    contextual: LinUCBSelector,
    classical: ThompsonSelector,
    gate: FeatureQualityGate,
    extractor: Box<dyn FeatureExtractor>,
    sink: Arc<dyn MetricsSink>,
    rounds: u64,
    fallbacks: u64,
}

impl HybridRouter {
    /// Create a router with no metrics backend.
    ///
    /// # Errors
    /// Returns a configuration error if `config` fails validation.
    pub fn new(config: RouterConfig) -> RouterResult<Self> {
        Self::with_sink(config, Arc::new(NoopSink))
    }

    /// Create a router that emits metrics to `sink`.
    ///
    /// # Errors
    /// Returns a configuration error if `config` fails validation.
    pub fn with_sink(config: RouterConfig, sink: Arc<dyn MetricsSink>) -> RouterResult<Self> {
        config.validate()?;
        let contextual = LinUCBSelector::new(config.dimension, config.exploration_alpha)?
            .with_sink(sink.clone());
        let classical = ThompsonSelector::new(config.cold_start_trials).with_sink(sink.clone());
        let gate = FeatureQualityGate::new(config.dimension, config.min_norm, config.max_norm);
        Ok(Self {
            config,
            contextual,
            classical,
            gate,
            extractor: Box::new(HashBucketExtractor::new()),
            sink,
            rounds: 0,
            fallbacks: 0,
        })
    }

    /// Replace the default hash-bucket extractor with a domain-specific one
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl FeatureExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Seed the classical selector's generator (deterministic tests)
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.classical.reseed(seed);
        self
    }

    /// The active configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Select a candidate for the request described by `ctx`.
    ///
    /// In `Hybrid` mode, features that pass the quality gate go to the
    /// contextual selector; everything else falls back to the classical
    /// one. `ClassicalOnly` skips features entirely. `ContextualOnly`
    /// treats absent or wrong-dimension features as a configuration
    /// error instead of silently substituting an algorithm.
    ///
    /// # Errors
    /// Returns `RouterError::EmptyCandidates` for an empty candidate
    /// list, or `RouterError::ContextualUnavailable` in `ContextualOnly`
    /// mode with malformed features.
    pub fn select(
        &mut self,
        candidates: &[&str],
        ctx: &RouteContext<'_>,
        task: Option<&str>,
    ) -> RouterResult<String> {
        if candidates.is_empty() {
            return Err(RouterError::EmptyCandidates);
        }

        let chosen = match self.route_delegate(ctx, true)? {
            Delegate::Contextual(features) => self.contextual.select(candidates, &features)?,
            Delegate::Classical => self
                .classical
                .select(candidates, task.unwrap_or(DEFAULT_TASK))?,
        };

        self.rounds += 1;
        self.sink
            .set_gauge(METRIC_CONTEXTUAL_ARMS, self.contextual.arm_count() as f64);
        Ok(chosen)
    }

    /// Fold an observed reward back into whichever algorithm the gate
    /// routes this context to, mirroring `select`.
    ///
    /// # Errors
    /// Returns `RouterError::ContextualUnavailable` in `ContextualOnly`
    /// mode with malformed features; feedback is otherwise always folded
    /// somewhere, never dropped.
    pub fn update(
        &mut self,
        candidate: &str,
        reward: f64,
        ctx: &RouteContext<'_>,
        task: Option<&str>,
    ) -> RouterResult<()> {
        match self.route_delegate(ctx, false)? {
            Delegate::Contextual(features) => self.contextual.update(candidate, reward, &features),
            Delegate::Classical => self
                .classical
                .update(candidate, reward, task.unwrap_or(DEFAULT_TASK)),
        }
        Ok(())
    }

    /// Resolve `ctx` into a feature vector of the configured dimension,
    /// or nothing if features are absent or malformed
    fn candidate_features(&self, ctx: &RouteContext<'_>) -> Option<Vec<f64>> {
        match ctx {
            RouteContext::Empty => None,
            RouteContext::Features(features) if features.len() == self.config.dimension => {
                Some(features.to_vec())
            }
            RouteContext::Features(_) => None,
            RouteContext::Map(context) => {
                Some(self.extractor.extract(context, self.config.dimension))
            }
        }
    }

    /// The single gating function: mode plus feature quality decide the
    /// delegate. `record_fallback` is set on the select path only, so
    /// one request can't count its fallback twice.
    fn route_delegate(
        &mut self,
        ctx: &RouteContext<'_>,
        record_fallback: bool,
    ) -> RouterResult<Delegate> {
        match self.config.mode {
            RouterMode::ClassicalOnly => Ok(Delegate::Classical),
            RouterMode::ContextualOnly => self.candidate_features(ctx).map_or_else(
                || {
                    Err(RouterError::contextual_unavailable(
                        self.config.dimension,
                        ctx.feature_len(),
                    ))
                },
                |features| Ok(Delegate::Contextual(features)),
            ),
            RouterMode::Hybrid => match self.candidate_features(ctx) {
                Some(features) => {
                    let quality = self.gate.score(Some(&features));
                    if quality >= self.config.feature_quality_min {
                        Ok(Delegate::Contextual(features))
                    } else {
                        if record_fallback {
                            debug!(
                                quality,
                                min = self.config.feature_quality_min,
                                "feature quality below minimum, falling back to classical bandit"
                            );
                            self.fallbacks += 1;
                            self.sink.incr_counter(METRIC_FALLBACKS, &[]);
                        }
                        Ok(Delegate::Classical)
                    }
                }
                None => Ok(Delegate::Classical),
            },
        }
    }

    /// Operational counters
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            rounds: self.rounds,
            fallbacks: self.fallbacks,
            contextual_arms: self.contextual.arm_count(),
            tasks: self.classical.task_count(),
            arm_updates: self
                .contextual
                .arms()
                .iter()
                .map(|(candidate, arm)| (candidate.clone(), arm.updates()))
                .collect(),
        }
    }

    /// Clone all learned state into a serializable snapshot
    pub fn snapshot(&self) -> RouterState {
        RouterState {
            config: self.config.clone(),
            arms: self.contextual.arms().clone(),
            posteriors: self.classical.posteriors().clone(),
        }
    }

    /// Rebuild a router from a snapshot, with no metrics backend.
    ///
    /// # Errors
    /// Returns a configuration error if the snapshot's configuration is
    /// invalid or its arms do not match the configured dimension.
    pub fn restore(state: RouterState) -> RouterResult<Self> {
        Self::restore_with_sink(state, Arc::new(NoopSink))
    }

    /// Rebuild a router from a snapshot, emitting metrics to `sink`.
    ///
    /// # Errors
    /// Returns a configuration error if the snapshot's configuration is
    /// invalid or its arms do not match the configured dimension.
    pub fn restore_with_sink(state: RouterState, sink: Arc<dyn MetricsSink>) -> RouterResult<Self> {
        let mut router = Self::with_sink(state.config, sink)?;
        router.contextual.restore_arms(state.arms)?;
        router.classical.restore_posteriors(state.posteriors);
        Ok(router)
    }

    /// Drop all learned state and counters
    pub fn reset(&mut self) {
        self.contextual.reset();
        self.classical.reset();
        self.rounds = 0;
        self.fallbacks = 0;
    }

    /// Drop classical posterior state for one task
    pub fn reset_task(&mut self, task: &str) {
        self.classical.reset_task(task);
    }

    /// The contextual selector (inspection)
    pub fn contextual(&self) -> &LinUCBSelector {
        &self.contextual
    }

    /// The classical selector (inspection)
    pub fn classical(&self) -> &ThompsonSelector {
        &self.classical
    }
}

impl std::fmt::Debug for HybridRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRouter")
            .field("mode", &self.config.mode)
            .field("dimension", &self.config.dimension)
            .field("rounds", &self.rounds)
            .field("fallbacks", &self.fallbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_telemetry::RecordingSink;

    fn config(dimension: usize) -> RouterConfig {
        RouterConfig::new()
            .with_dimension(dimension)
            .with_cold_start_trials(0)
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(HybridRouter::new(RouterConfig::new().with_dimension(0)).is_err());
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let mut router = HybridRouter::new(config(4)).unwrap().with_seed(1);
        let err = router
            .select(&[], &RouteContext::Empty, None)
            .unwrap_err();
        assert!(matches!(err, RouterError::EmptyCandidates));
    }

    #[test]
    fn test_good_features_use_contextual_selector() {
        let sink = Arc::new(RecordingSink::new());
        let mut router = HybridRouter::with_sink(config(4), sink.clone())
            .unwrap()
            .with_seed(2);

        let features = [1.0, 0.0, 0.0, 0.0];
        router
            .select(&["a", "b"], &RouteContext::Features(&features), None)
            .unwrap();

        assert_eq!(
            sink.counter_value_with(crate::METRIC_SELECTIONS, "algorithm", "linucb"),
            1
        );
        assert_eq!(sink.counter_value(METRIC_FALLBACKS), 0);
    }

    #[test]
    fn test_low_quality_features_fall_back_deterministically() {
        let sink = Arc::new(RecordingSink::new());
        let mut router = HybridRouter::with_sink(config(4), sink.clone())
            .unwrap()
            .with_seed(3);

        // All-zero vector scores 0.5 from the norm penalty, below the
        // default 0.5 threshold only when combined with NaN; use NaN
        let features = [f64::NAN, 0.0, 0.0, 0.0];
        for _ in 0..5 {
            router
                .select(&["a", "b"], &RouteContext::Features(&features), Some("t"))
                .unwrap();
        }

        assert_eq!(
            sink.counter_value_with(crate::METRIC_SELECTIONS, "algorithm", "thompson"),
            5
        );
        assert_eq!(
            sink.counter_value_with(crate::METRIC_SELECTIONS, "algorithm", "linucb"),
            0
        );
        assert_eq!(sink.counter_value(METRIC_FALLBACKS), 5);
        assert_eq!(router.stats().fallbacks, 5);
    }

    #[test]
    fn test_absent_features_use_classical_without_fallback_event() {
        let sink = Arc::new(RecordingSink::new());
        let mut router = HybridRouter::with_sink(config(4), sink.clone())
            .unwrap()
            .with_seed(4);

        router.select(&["a"], &RouteContext::Empty, None).unwrap();

        assert_eq!(
            sink.counter_value_with(crate::METRIC_SELECTIONS, "algorithm", "thompson"),
            1
        );
        assert_eq!(sink.counter_value(METRIC_FALLBACKS), 0);
    }

    #[test]
    fn test_wrong_dimension_features_fall_back() {
        let mut router = HybridRouter::new(config(4)).unwrap().with_seed(5);
        let features = [1.0, 0.0];
        router
            .select(&["a"], &RouteContext::Features(&features), None)
            .unwrap();
        // Classical state was touched, contextual was not
        assert_eq!(router.classical().task_trials(DEFAULT_TASK), 0);
        assert!(router.classical().posterior(DEFAULT_TASK, "a").is_some());
        assert_eq!(router.contextual().arm_count(), 0);
    }

    #[test]
    fn test_classical_only_ignores_features() {
        let mut router =
            HybridRouter::new(config(4).with_mode(RouterMode::ClassicalOnly))
                .unwrap()
                .with_seed(6);

        let features = [1.0, 0.0, 0.0, 0.0];
        router
            .select(&["a"], &RouteContext::Features(&features), None)
            .unwrap();
        assert_eq!(router.contextual().arm_count(), 0);
    }

    #[test]
    fn test_contextual_only_rejects_malformed_features() {
        let mut router =
            HybridRouter::new(config(4).with_mode(RouterMode::ContextualOnly))
                .unwrap()
                .with_seed(7);

        let err = router
            .select(&["a"], &RouteContext::Empty, None)
            .unwrap_err();
        assert!(matches!(err, RouterError::ContextualUnavailable { .. }));

        let short = [1.0, 0.0];
        let err = router
            .select(&["a"], &RouteContext::Features(&short), None)
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::ContextualUnavailable {
                expected: 4,
                actual: Some(2)
            }
        ));

        let err = router
            .update("a", 1.0, &RouteContext::Empty, None)
            .unwrap_err();
        assert!(matches!(err, RouterError::ContextualUnavailable { .. }));
    }

    #[test]
    fn test_update_mirrors_select_gating() {
        let mut router = HybridRouter::new(config(4)).unwrap().with_seed(8);

        let good = [1.0, 0.0, 0.0, 0.0];
        router
            .update("a", 1.0, &RouteContext::Features(&good), None)
            .unwrap();
        assert_eq!(router.contextual().arm("a").unwrap().updates(), 1);

        // Gated-off features fall through to the classical update
        let bad = [f64::NAN, 0.0, 0.0, 0.0];
        router
            .update("a", 1.0, &RouteContext::Features(&bad), Some("t"))
            .unwrap();
        assert_eq!(router.classical().posterior("t", "a").unwrap().trials(), 1);
        // And the fallback counter only moves on the select path
        assert_eq!(router.stats().fallbacks, 0);
    }

    #[test]
    fn test_map_context_routes_contextually() {
        let mut router = HybridRouter::new(config(8)).unwrap().with_seed(9);

        let mut ctx = Context::new();
        ctx.insert("task".to_string(), "chat".into());
        ctx.insert("tokens".to_string(), 512.0.into());

        router
            .select(&["a", "b"], &RouteContext::Map(&ctx), None)
            .unwrap();
        // The extractor produces a unit-norm vector, which passes the gate
        assert_eq!(router.contextual().arm_count(), 2);
    }

    #[test]
    fn test_custom_extractor_is_used() {
        let mut router = HybridRouter::new(config(4))
            .unwrap()
            .with_seed(10)
            .with_extractor(|_: &Context, dimension: usize| vec![1.0; dimension]);

        let ctx = Context::new();
        router
            .select(&["a"], &RouteContext::Map(&ctx), None)
            .unwrap();
        assert_eq!(router.contextual().arm_count(), 1);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut router = HybridRouter::new(config(4)).unwrap().with_seed(11);
        let features = [1.0, 0.0, 0.0, 0.0];
        for _ in 0..10 {
            router
                .update("a", 1.0, &RouteContext::Features(&features), None)
                .unwrap();
            router
                .update("b", 0.0, &RouteContext::Features(&features), None)
                .unwrap();
            router.update("a", 1.0, &RouteContext::Empty, Some("t")).unwrap();
        }

        let json = serde_json::to_string(&router.snapshot()).unwrap();
        let state: RouterState = serde_json::from_str(&json).unwrap();
        let mut restored = HybridRouter::restore(state).unwrap().with_seed(11);

        assert_eq!(restored.contextual().arm("a").unwrap().updates(), 10);
        assert_eq!(
            restored.classical().posterior("t", "a").unwrap().trials(),
            10
        );
        // The restored router keeps preferring the trained arm
        assert_eq!(
            restored
                .select(&["a", "b"], &RouteContext::Features(&features), None)
                .unwrap(),
            "a"
        );
    }

    #[test]
    fn test_restore_rejects_dimension_mismatch() {
        let mut router = HybridRouter::new(config(4)).unwrap().with_seed(12);
        let features = [1.0, 0.0, 0.0, 0.0];
        router
            .update("a", 1.0, &RouteContext::Features(&features), None)
            .unwrap();

        let mut state = router.snapshot();
        state.config.dimension = 8;
        assert!(HybridRouter::restore(state).is_err());
    }

    #[test]
    fn test_reset_clears_state_and_counters() {
        let mut router = HybridRouter::new(config(4)).unwrap().with_seed(13);
        let features = [1.0, 0.0, 0.0, 0.0];
        router
            .select(&["a"], &RouteContext::Features(&features), None)
            .unwrap();
        router
            .update("a", 1.0, &RouteContext::Features(&features), None)
            .unwrap();

        router.reset();
        let stats = router.stats();
        assert_eq!(stats.rounds, 0);
        assert_eq!(stats.contextual_arms, 0);
        assert_eq!(stats.tasks, 0);
    }

    #[test]
    fn test_stats_reports_arm_updates() {
        let mut router = HybridRouter::new(config(4)).unwrap().with_seed(14);
        let features = [1.0, 0.0, 0.0, 0.0];
        for _ in 0..3 {
            router
                .update("a", 1.0, &RouteContext::Features(&features), None)
                .unwrap();
        }

        let stats = router.stats();
        assert_eq!(stats.arm_updates.get("a"), Some(&3));
    }
}
