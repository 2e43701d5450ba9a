//! Prometheus metrics collection for mroutemgrd
//!
//! Counters and duration histograms are labelled by (`function`, `variable`, `type`).

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

const LABELS: &[&str] = &["function", "variable", "type"];

/// Metrics collector for mroutemgrd
#[derive(Clone)]
pub struct MetricsCollector {
    pub counters: CounterVec,
    pub durations_seconds: HistogramVec,

    // Registry for export
    pub registry: Arc<Registry>,
}

impl MetricsCollector {
    /// Create a collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let counters = CounterVec::new(
            Opts::new("mroutemgrd_counters_total", "mroutemgrd counters"),
            LABELS,
        )?;
        registry.register(Box::new(counters.clone()))?;

        let durations_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mroutemgrd_durations_seconds",
                "mroutemgrd step durations in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            LABELS,
        )?;
        registry.register(Box::new(durations_seconds.clone()))?;

        Ok(Self {
            counters,
            durations_seconds,
            registry: Arc::new(registry),
        })
    }

    /// Increment the counter for (function, variable, type)
    pub fn inc(&self, function: &str, variable: &str, kind: &str) {
        self.counters
            .with_label_values(&[function, variable, kind])
            .inc();
    }

    /// Current counter value for (function, variable, type)
    #[cfg(test)]
    pub(crate) fn count(&self, function: &str, variable: &str, kind: &str) -> f64 {
        self.counters
            .with_label_values(&[function, variable, kind])
            .get()
    }

    /// Record a duration for (function, variable, type)
    pub fn observe(&self, function: &str, variable: &str, kind: &str, duration_secs: f64) {
        self.durations_seconds
            .with_label_values(&[function, variable, kind])
            .observe(duration_secs);
    }
}
