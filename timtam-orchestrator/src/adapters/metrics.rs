//! In-process metrics registry.
//!
//! Counters and latency aggregates keyed by metric name. Nothing is exported;
//! the status endpoint serves a snapshot and [`MetricsRegistry::flush`] logs
//! one at shutdown.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use timtam_core::traits::MetricsSink;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub total_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl LatencySummary {
    fn first(ms: f64) -> Self {
        Self {
            count: 1,
            total_ms: ms,
            min_ms: ms,
            max_ms: ms,
        }
    }

    fn record(&mut self, ms: f64) {
        self.count += 1;
        self.total_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);
    }

    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub latencies: BTreeMap<String, LatencySummary>,
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: Mutex<BTreeMap<String, u64>>,
    latencies: Mutex<BTreeMap<String, LatencySummary>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.lock().map(|c| c.clone()).unwrap_or_default(),
            latencies: self.latencies.lock().map(|l| l.clone()).unwrap_or_default(),
        }
    }

    /// Emit every metric as one log event.
    pub fn flush(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            metric = "flush",
            counters = ?snapshot.counters,
            latency_series = snapshot.latencies.len(),
        );
    }
}

impl MetricsSink for MetricsRegistry {
    fn put_latency(&self, name: &str, ms: f64) {
        if let Ok(mut latencies) = self.latencies.lock() {
            latencies
                .entry(name.to_string())
                .and_modify(|s| s.record(ms))
                .or_insert_with(|| LatencySummary::first(ms));
        }
        tracing::trace!(metric = name, ms, "latency recorded");
    }

    fn put_count(&self, name: &str, value: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name.to_string()).or_default() += value;
        }
        tracing::trace!(metric = name, value, "counter incremented");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = MetricsRegistry::new();
        m.put_count("Ingest.Events", 1);
        m.put_count("Ingest.Events", 2);
        m.put_count("Ingest.Errors", 1);

        let snap = m.snapshot();
        assert_eq!(snap.counters["Ingest.Events"], 3);
        assert_eq!(snap.counters["Ingest.Errors"], 1);
    }

    #[test]
    fn latencies_aggregate() {
        let m = MetricsRegistry::new();
        for ms in [30.0, 10.0, 20.0] {
            m.put_latency("Grasp.x.ExecutionLatency", ms);
        }

        let s = m.snapshot().latencies["Grasp.x.ExecutionLatency"];
        assert_eq!(s.count, 3);
        assert_eq!(s.min_ms, 10.0);
        assert_eq!(s.max_ms, 30.0);
        assert_eq!(s.mean_ms(), 20.0);
    }

    #[test]
    fn empty_snapshot_serializes() {
        let json = serde_json::to_value(MetricsRegistry::new().snapshot()).unwrap();
        assert_eq!(json, serde_json::json!({"counters": {}, "latencies": {}}));
    }
}
