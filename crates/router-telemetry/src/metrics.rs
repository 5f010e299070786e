//! Metrics sink trait and implementations.

use parking_lot::{Mutex, RwLock};
use prometheus::{Gauge, IntCounterVec, Opts, Registry};
use std::collections::HashMap;
use tracing::debug;

/// A sink for router metrics.
///
/// Implementations must never panic: the router calls the sink
/// unconditionally on every selection and every fallback, and a
/// misbehaving metrics backend must not take routing down with it.
pub trait MetricsSink: Send + Sync {
    /// Increment a counter by one
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]);

    /// Set a gauge to the given value
    fn set_gauge(&self, name: &str, value: f64);
}

/// A sink that discards all metrics.
///
/// Used when the embedding application supplies no metrics backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn incr_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}

    fn set_gauge(&self, _name: &str, _value: f64) {}
}

/// A sink backed by a prometheus [`Registry`].
///
/// Counter and gauge families are registered lazily on first use.
/// Registration or lookup failures are logged at debug level and
/// dropped; they never propagate to the router.
pub struct PrometheusSink {
    registry: Registry,
    counters: RwLock<HashMap<String, IntCounterVec>>,
    gauges: RwLock<HashMap<String, Gauge>>,
}

impl PrometheusSink {
    /// Create a sink with a fresh registry
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Create a sink that registers metrics into an existing registry
    #[must_use]
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
        }
    }

    /// Access the underlying registry (for scrape endpoints)
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get or register the counter family for `name`.
    ///
    /// A family's label keys are fixed by the first call that uses the
    /// name; callers must keep label keys stable per counter name.
    fn counter_family(&self, name: &str, label_names: &[&str]) -> Option<IntCounterVec> {
        if let Some(found) = self.counters.read().get(name) {
            return Some(found.clone());
        }

        let opts = Opts::new(name, format!("{name} (bandit router)"));
        let family = match IntCounterVec::new(opts, label_names) {
            Ok(family) => family,
            Err(err) => {
                debug!(metric = name, error = %err, "failed to create counter family");
                return None;
            }
        };

        let mut counters = self.counters.write();
        // Another caller may have registered while we built ours
        if let Some(found) = counters.get(name) {
            return Some(found.clone());
        }
        if let Err(err) = self.registry.register(Box::new(family.clone())) {
            debug!(metric = name, error = %err, "failed to register counter family");
            return None;
        }
        counters.insert(name.to_string(), family.clone());
        Some(family)
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for PrometheusSink {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let label_names: Vec<&str> = labels.iter().map(|(key, _)| *key).collect();
        let label_values: Vec<&str> = labels.iter().map(|(_, value)| *value).collect();

        let Some(family) = self.counter_family(name, &label_names) else {
            return;
        };
        match family.get_metric_with_label_values(&label_values) {
            Ok(counter) => counter.inc(),
            Err(err) => {
                debug!(metric = name, error = %err, "counter label mismatch");
            }
        }
    }

    fn set_gauge(&self, name: &str, value: f64) {
        if let Some(found) = self.gauges.read().get(name) {
            found.set(value);
            return;
        }

        let gauge = match Gauge::new(name.to_string(), format!("{name} (bandit router)")) {
            Ok(gauge) => gauge,
            Err(err) => {
                debug!(metric = name, error = %err, "failed to create gauge");
                return;
            }
        };

        let mut gauges = self.gauges.write();
        if let Some(found) = gauges.get(name) {
            found.set(value);
            return;
        }
        if let Err(err) = self.registry.register(Box::new(gauge.clone())) {
            debug!(metric = name, error = %err, "failed to register gauge");
            return;
        }
        gauge.set(value);
        gauges.insert(name.to_string(), gauge);
    }
}

impl std::fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusSink")
            .field("counters", &self.counters.read().len())
            .field("gauges", &self.gauges.read().len())
            .finish()
    }
}

/// A sink that records every emission in memory.
///
/// Intended for tests that need to assert which events the router
/// emitted (for example, which underlying selector handled a request).
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CounterEvent>>,
    gauges: Mutex<HashMap<String, f64>>,
}

/// A single recorded counter increment
#[derive(Debug, Clone)]
pub struct CounterEvent {
    /// Counter name
    pub name: String,
    /// Labels attached to the increment
    pub labels: Vec<(String, String)>,
}

impl RecordingSink {
    /// Create an empty recording sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total increments recorded for a counter name, across all labels
    pub fn counter_value(&self, name: &str) -> u64 {
        self.events
            .lock()
            .iter()
            .filter(|event| event.name == name)
            .count() as u64
    }

    /// Increments recorded for a counter name carrying a specific label
    pub fn counter_value_with(&self, name: &str, key: &str, value: &str) -> u64 {
        self.events
            .lock()
            .iter()
            .filter(|event| {
                event.name == name
                    && event
                        .labels
                        .iter()
                        .any(|(k, v)| k == key && v == value)
            })
            .count() as u64
    }

    /// Last value set for a gauge, if any
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        self.gauges.lock().get(name).copied()
    }

    /// All recorded counter events, in emission order
    pub fn events(&self) -> Vec<CounterEvent> {
        self.events.lock().clone()
    }
}

impl MetricsSink for RecordingSink {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.events.lock().push(CounterEvent {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
        });
    }

    fn set_gauge(&self, name: &str, value: f64) {
        self.gauges.lock().insert(name.to_string(), value);
    }
}
