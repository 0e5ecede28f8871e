//! A metrics recorder that logs all captured metrics when asked to.
//!
//! macaroni exits right after one dispatch, so instead of a periodic
//! exporter the binary installs this recorder with `--log-metrics` and logs
//! a single snapshot before exiting.

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::{AtomicStorage, Registry};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Keeps metrics in memory and logs them via `tracing::info!` on [`log_snapshot`].
///
/// [`log_snapshot`]: LoggingRecorder::log_snapshot
#[derive(Clone)]
pub struct LoggingRecorder {
    registry: Arc<Registry<Key, AtomicStorage>>,
}

impl Default for LoggingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingRecorder {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new(AtomicStorage)),
        }
    }

    /// Returns every metric as a printable line, sorted by key.
    pub fn snapshot(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for (key, counter) in self.registry.get_counter_handles() {
            lines.push(format!("[Counter] {}: {}", key, counter.load(Ordering::Relaxed)));
        }

        for (key, gauge) in self.registry.get_gauge_handles() {
            let value = f64::from_bits(gauge.load(Ordering::Relaxed));
            lines.push(format!("[Gauge] {}: {}", key, value));
        }

        for (key, histogram) in self.registry.get_histogram_handles() {
            let samples = histogram.data();
            if samples.is_empty() {
                continue;
            }
            let sum: f64 = samples.iter().sum();
            let max = samples.iter().cloned().fold(f64::MIN, f64::max);
            lines.push(format!(
                "[Histogram] {}: count={} sum={:.6} max={:.6}",
                key,
                samples.len(),
                sum,
                max
            ));
        }

        lines.sort();
        lines
    }

    pub fn log_snapshot(&self) {
        tracing::info!("--- Metrics Snapshot ---");
        for line in self.snapshot() {
            tracing::info!("{}", line);
        }
    }
}

impl Recorder for LoggingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // Not implemented for this simple recorder
    }

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // Not implemented for this simple recorder
    }

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // Not implemented for this simple recorder
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |c| c.clone()).into()
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |g| g.clone()).into()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |h| h.clone()).into()
    }
}
