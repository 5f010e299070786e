//! Thompson Sampling context-free bandit.
//!
//! Each (task, candidate) pair maintains a Beta(α, β) posterior over its
//! reward. Selection draws one sample per candidate and picks the
//! maximum; before a task has accumulated `cold_start_trials` total
//! observations, candidates are chosen uniformly at random instead
//! (pure exploration).

use crate::{clamp_reward, METRIC_SELECTIONS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use router_core::{RouterError, RouterResult};
use router_telemetry::{MetricsSink, NoopSink};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Beta posterior over a candidate's reward in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaPosterior {
    /// Success mass (α), always > 0
    alpha: f64,
    /// Failure mass (β), always > 0
    beta: f64,
    /// Number of updates folded in
    trials: u64,
}

impl BetaPosterior {
    /// Uniform prior: Beta(1, 1)
    #[must_use]
    pub fn new() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
            trials: 0,
        }
    }

    /// Posterior mean α / (α + β)
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Success mass
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Failure mass
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Number of updates folded in
    pub fn trials(&self) -> u64 {
        self.trials
    }

    /// Draw one sample from the posterior
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        // α, β > 0 is an invariant, so construction only fails if state
        // was corrupted externally; degrade to the mean in that case
        match Beta::new(self.alpha, self.beta) {
            Ok(dist) => dist.sample(rng),
            Err(_) => self.mean(),
        }
    }

    /// Fold a clamped reward into the posterior
    fn observe(&mut self, reward: f64) {
        self.alpha += reward;
        self.beta += 1.0 - reward;
        self.trials += 1;
    }
}

impl Default for BetaPosterior {
    fn default() -> Self {
        Self::new()
    }
}

/// Thompson Sampling selector with per-task posterior maps.
pub struct ThompsonSelector {
    cold_start_trials: u64,
    tasks: HashMap<String, HashMap<String, BetaPosterior>>,
    rng: StdRng,
    sink: Arc<dyn MetricsSink>,
}

impl ThompsonSelector {
    /// Create a selector that explores uniformly until a task has seen
    /// `cold_start_trials` total observations
    #[must_use]
    pub fn new(cold_start_trials: u64) -> Self {
        Self {
            cold_start_trials,
            tasks: HashMap::new(),
            rng: StdRng::from_entropy(),
            sink: Arc::new(NoopSink),
        }
    }

    /// Seed the internal generator (deterministic tests)
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    /// Reseed the internal generator in place
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Attach a metrics sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Select a candidate for `task`.
    ///
    /// Posteriors are created lazily with a uniform prior for every
    /// candidate in the list. During cold start the choice is uniformly
    /// random; afterwards it is the maximal Beta sample.
    ///
    /// # Errors
    /// Returns `RouterError::EmptyCandidates` for an empty candidate list.
    pub fn select(&mut self, candidates: &[&str], task: &str) -> RouterResult<String> {
        if candidates.is_empty() {
            return Err(RouterError::EmptyCandidates);
        }

        let posteriors = self.tasks.entry(task.to_string()).or_default();
        for &candidate in candidates {
            posteriors
                .entry(candidate.to_string())
                .or_insert_with(BetaPosterior::new);
        }

        let total_trials: u64 = posteriors.values().map(BetaPosterior::trials).sum();
        let chosen = if total_trials < self.cold_start_trials {
            debug!(task, total_trials, "cold start, exploring uniformly");
            candidates[self.rng.gen_range(0..candidates.len())]
        } else {
            let mut best = (candidates[0], f64::NEG_INFINITY);
            for &candidate in candidates {
                let Some(posterior) = posteriors.get(candidate) else {
                    continue;
                };
                let sample = posterior.sample(&mut self.rng);
                if sample > best.1 {
                    best = (candidate, sample);
                }
            }
            best.0
        };

        self.sink
            .incr_counter(METRIC_SELECTIONS, &[("algorithm", "thompson")]);
        Ok(chosen.to_string())
    }

    /// Fold an observed reward into a candidate's posterior under `task`.
    ///
    /// The reward is clamped into [0, 1] (non-finite counts as zero), so
    /// α and β can never go non-positive. Updating a never-selected
    /// candidate creates a fresh posterior first.
    pub fn update(&mut self, candidate: &str, reward: f64, task: &str) {
        let reward = clamp_reward(reward);
        self.tasks
            .entry(task.to_string())
            .or_default()
            .entry(candidate.to_string())
            .or_insert_with(BetaPosterior::new)
            .observe(reward);
    }

    /// Look up the posterior for a (task, candidate) pair
    pub fn posterior(&self, task: &str, candidate: &str) -> Option<&BetaPosterior> {
        self.tasks.get(task).and_then(|map| map.get(candidate))
    }

    /// Total observations accumulated under a task
    pub fn task_trials(&self, task: &str) -> u64 {
        self.tasks
            .get(task)
            .map_or(0, |map| map.values().map(BetaPosterior::trials).sum())
    }

    /// Number of tasks with posterior state
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Drop all learned state
    pub fn reset(&mut self) {
        self.tasks.clear();
    }

    /// Drop learned state for a single task
    pub fn reset_task(&mut self, task: &str) {
        self.tasks.remove(task);
    }

    /// All per-task posterior maps
    pub fn posteriors(&self) -> &HashMap<String, HashMap<String, BetaPosterior>> {
        &self.tasks
    }

    /// Replace posterior state from a snapshot
    pub(crate) fn restore_posteriors(
        &mut self,
        tasks: HashMap<String, HashMap<String, BetaPosterior>>,
    ) {
        self.tasks = tasks;
    }
}

impl std::fmt::Debug for ThompsonSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThompsonSelector")
            .field("cold_start_trials", &self.cold_start_trials)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
