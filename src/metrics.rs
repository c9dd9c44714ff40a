//! Prediction statistics for the churn service.

use crate::types::prediction::{PredictionResult, RiskLevel};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector shared by every prediction call
pub struct InferenceMetrics {
    /// Total records scored
    pub records_scored: AtomicU64,
    /// Records predicted as churn
    pub churn_predictions: AtomicU64,
    /// Calls that returned an error
    pub failed_calls: AtomicU64,
    /// Predictions per tier, indexed like `RiskLevel::ALL`
    by_level: [AtomicU64; 4],
    /// Call latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Churn probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl InferenceMetrics {
    pub fn new() -> Self {
        Self {
            records_scored: AtomicU64::new(0),
            churn_predictions: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            by_level: Default::default(),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one successful call and the predictions it produced.
    pub fn record_call(&self, latency: Duration, results: &[PredictionResult]) {
        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > MAX_LATENCY_SAMPLES {
                times.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }

        self.records_scored
            .fetch_add(results.len() as u64, Ordering::Relaxed);

        let mut buckets = self.probability_buckets.write().ok();
        for result in results {
            if result.is_churn() {
                self.churn_predictions.fetch_add(1, Ordering::Relaxed);
            }
            self.by_level[level_index(result.risk_level)].fetch_add(1, Ordering::Relaxed);

            if let Some(buckets) = buckets.as_mut() {
                let bucket = (result.churn_probability * 10.0).clamp(0.0, 9.0) as usize;
                buckets[bucket] += 1;
            }
        }
    }

    pub fn record_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Latency statistics over the retained samples
    pub fn latency_stats(&self) -> LatencyStats {
        let times = match self.latencies.read() {
            Ok(times) => times,
            Err(_) => return LatencyStats::default(),
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Records scored per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    /// Count of predictions per tier, lowest tier first.
    pub fn level_counts(&self) -> [(RiskLevel, u64); 4] {
        RiskLevel::ALL.map(|level| {
            (
                level,
                self.by_level[level_index(level)].load(Ordering::Relaxed),
            )
        })
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let scored = self.records_scored.load(Ordering::Relaxed);
        let churned = self.churn_predictions.load(Ordering::Relaxed);
        let failed = self.failed_calls.load(Ordering::Relaxed);
        let churn_rate = if scored > 0 {
            (churned as f64 / scored as f64) * 100.0
        } else {
            0.0
        };
        let latency = self.latency_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║               CHURN INFERENCE - METRICS SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Records Scored:  {:>8}  │  Throughput: {:>8.1} rec/s      ║",
            scored,
            self.throughput()
        );
        info!(
            "║ Churn Predicted: {:>8}  │  Churn Rate: {:>6.1}%           ║",
            churned, churn_rate
        );
        info!("║ Failed Calls:    {:>8}                                    ║", failed);
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Call Latency (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}  ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Risk Level:                                   ║");
        for (level, count) in self.level_counts() {
            let pct = if scored > 0 {
                (count as f64 / scored as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>6} ({:>5.1}%)", level.as_str(), count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Churn Probability Distribution:                              ║");
        let dist = self.probability_distribution();
        let total: u64 = dist.iter().sum();
        for (i, &count) in dist.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for InferenceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn level_index(level: RiskLevel) -> usize {
    match level {
        RiskLevel::Low => 0,
        RiskLevel::Medium => 1,
        RiskLevel::High => 2,
        RiskLevel::Critical => 3,
    }
}

/// Call latency statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::RiskLevelThresholds;

    fn result(p: f64) -> PredictionResult {
        PredictionResult::new(
            u8::from(p > 0.5),
            [1.0 - p, p],
            &RiskLevelThresholds::default(),
        )
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = InferenceMetrics::new();

        metrics.record_call(Duration::from_micros(100), &[result(0.1), result(0.9)]);
        metrics.record_call(Duration::from_micros(300), &[result(0.65)]);
        metrics.record_failure();

        assert_eq!(metrics.records_scored.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.churn_predictions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.failed_calls.load(Ordering::Relaxed), 1);

        let counts = metrics.level_counts();
        assert_eq!(counts[0], (RiskLevel::Low, 1));
        assert_eq!(counts[2], (RiskLevel::High, 1));
        assert_eq!(counts[3], (RiskLevel::Critical, 1));
    }

    #[test]
    fn test_probability_buckets() {
        let metrics = InferenceMetrics::new();
        metrics.record_call(
            Duration::from_micros(10),
            &[result(0.0), result(0.05), result(0.55), result(1.0)],
        );

        let dist = metrics.probability_distribution();
        assert_eq!(dist[0], 2);
        assert_eq!(dist[5], 1);
        assert_eq!(dist[9], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = InferenceMetrics::new();
        assert_eq!(metrics.latency_stats(), LatencyStats::default());

        for us in [100, 200, 300, 400] {
            metrics.record_call(Duration::from_micros(us), &[]);
        }
        let stats = metrics.latency_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);
    }
}
