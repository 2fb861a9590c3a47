// Production run metrics
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Counters and latency figures for one production run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub requests: u64,
    pub completed: u64,
    pub failed: u64,
    pub rate_limited: u64,
    pub transient_failures: u64,
    pub safety_blocked: u64,
    pub avg_latency_ms: f64,
    pub p99_latency_ms: f64,
}

/// Metrics collector
#[derive(Clone, Default)]
pub struct ProductionMetrics {
    metrics: Arc<RwLock<RunMetrics>>,
    latencies: Arc<RwLock<Vec<Duration>>>,
}

impl ProductionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one provider request and its latency
    pub async fn record_request(&self, latency: Duration) {
        let mut metrics = self.metrics.write().await;
        metrics.requests += 1;

        let mut latencies = self.latencies.write().await;
        latencies.push(latency);

        let total_ms: f64 = latencies.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
        metrics.avg_latency_ms = total_ms / latencies.len() as f64;

        let mut sorted = latencies.clone();
        sorted.sort();
        let p99_idx = (sorted.len() as f64 * 0.99) as usize;
        let p99_idx = p99_idx.min(sorted.len() - 1);
        metrics.p99_latency_ms = sorted[p99_idx].as_secs_f64() * 1000.0;
    }

    pub async fn record_completed(&self) {
        self.metrics.write().await.completed += 1;
    }

    pub async fn record_failed(&self) {
        self.metrics.write().await.failed += 1;
    }

    pub async fn record_rate_limited(&self) {
        self.metrics.write().await.rate_limited += 1;
    }

    pub async fn record_transient_failure(&self) {
        self.metrics.write().await.transient_failures += 1;
    }

    pub async fn record_safety_blocked(&self) {
        self.metrics.write().await.safety_blocked += 1;
    }

    /// Get current metrics
    pub async fn snapshot(&self) -> RunMetrics {
        self.metrics.read().await.clone()
    }

    /// Print metrics to log
    pub async fn log_summary(&self) {
        let m = self.snapshot().await;
        info!(
            target = "metrics",
            requests = m.requests,
            completed = m.completed,
            failed = m.failed,
            rate_limited = m.rate_limited,
            transient_failures = m.transient_failures,
            safety_blocked = m.safety_blocked,
            avg_latency_ms = format!("{:.2}", m.avg_latency_ms),
            p99_latency_ms = format!("{:.2}", m.p99_latency_ms),
            "Run metrics"
        );
    }
}
