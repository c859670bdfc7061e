//! Metrics collection and reporting
//!
//! Counters live in atomics for the `/stats` endpoint and are mirrored to
//! the `metrics` facade, which the server exports in Prometheus format.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use triage_core::ClassificationResult;

/// Metrics collector for the triage service
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    events_received: AtomicU64,
    events_ignored: AtomicU64,
    classifications: AtomicU64,
    fallbacks: AtomicU64,
    labels_applied: AtomicU64,
    manual_triage: AtomicU64,
    label_failures: AtomicU64,
    store_failures: AtomicU64,
    total_latency_us: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Record an inbound webhook event
    pub fn record_event(&self, kind: &str) {
        self.inner.events_received.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("triage_events_total", "kind" => kind.to_string()).increment(1);
    }

    /// Record an event that needed no classification
    pub fn record_ignored(&self) {
        self.inner.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished classification
    pub fn record_classification(&self, result: &ClassificationResult) {
        self.inner.classifications.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_latency_us
            .fetch_add(result.latency_us, Ordering::Relaxed);
        if result.method.is_fallback() {
            self.inner.fallbacks.fetch_add(1, Ordering::Relaxed);
        }

        ::metrics::counter!(
            "triage_classifications_total",
            "method" => result.method.to_string(),
            "band" => result.band.as_str()
        )
        .increment(1);
        ::metrics::histogram!("triage_classification_latency_ms")
            .record(result.latency_us as f64 / 1000.0);
    }

    /// Record a label written back to the support platform
    pub fn record_label_applied(&self) {
        self.inner.labels_applied.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("triage_labels_applied_total").increment(1);
    }

    /// Record a ticket left for manual triage (confidence below threshold)
    pub fn record_manual_triage(&self) {
        self.inner.manual_triage.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed label write
    pub fn record_label_failure(&self) {
        self.inner.label_failures.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("triage_errors_total", "kind" => "label").increment(1);
    }

    /// Record a failed audit write
    pub fn record_store_failure(&self) {
        self.inner.store_failures.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("triage_errors_total", "kind" => "store").increment(1);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            events_received: load(&self.inner.events_received),
            events_ignored: load(&self.inner.events_ignored),
            classifications: load(&self.inner.classifications),
            fallbacks: load(&self.inner.fallbacks),
            labels_applied: load(&self.inner.labels_applied),
            manual_triage: load(&self.inner.manual_triage),
            label_failures: load(&self.inner.label_failures),
            store_failures: load(&self.inner.store_failures),
            total_latency_us: load(&self.inner.total_latency_us),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub events_ignored: u64,
    pub classifications: u64,
    pub fallbacks: u64,
    pub labels_applied: u64,
    pub manual_triage: u64,
    pub label_failures: u64,
    pub store_failures: u64,
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    /// Average classification latency
    pub fn avg_latency_us(&self) -> u64 {
        if self.classifications == 0 {
            0
        } else {
            self.total_latency_us / self.classifications
        }
    }

    /// Share of classifications produced by a fallback path
    pub fn fallback_rate(&self) -> f64 {
        if self.classifications == 0 {
            0.0
        } else {
            self.fallbacks as f64 / self.classifications as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{Confidence, Method, PriorityBand};

    #[test]
    fn test_metrics_collection() {
        let metrics = MetricsCollector::new();

        let mut ok = ClassificationResult::new(
            PriorityBand::P1,
            Confidence::Score(0.8),
            Method::Rules,
            200,
        );
        ok.latency_us = 3000;
        let mut fallback = ok.clone();
        fallback.method = Method::RulesFallback;
        fallback.latency_us = 1000;

        metrics.record_event("message.created");
        metrics.record_classification(&ok);
        metrics.record_classification(&fallback);
        metrics.record_label_applied();
        metrics.record_store_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_received, 1);
        assert_eq!(snapshot.classifications, 2);
        assert_eq!(snapshot.fallbacks, 1);
        assert_eq!(snapshot.labels_applied, 1);
        assert_eq!(snapshot.store_failures, 1);
        assert_eq!(snapshot.avg_latency_us(), 2000);
        assert_eq!(snapshot.fallback_rate(), 0.5);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = MetricsCollector::new();
        let clone = metrics.clone();
        clone.record_ignored();
        assert_eq!(metrics.snapshot().events_ignored, 1);
        assert_eq!(metrics.snapshot().fallback_rate(), 0.0);
    }
}
