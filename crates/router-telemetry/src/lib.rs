//! # Router Telemetry
//!
//! Metrics sink abstraction for the bandit router.
//!
//! The router emits selection, fallback, and degraded-precision events to
//! an injected [`MetricsSink`]. When no sink is supplied the router uses
//! [`NoopSink`], so the absence of a metrics backend degrades to silent
//! no-ops rather than a crash.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod metrics;

// Re-export main types
pub use metrics::{MetricsSink, NoopSink, PrometheusSink, RecordingSink};
