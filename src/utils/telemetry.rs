// file: src/utils/telemetry.rs
// description: timing and size metrics for identification runs
// reference: tracing based instrumentation

use crate::expression::Expression;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Logs how long a named operation took.
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        debug!("Starting {}", operation);
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!("Finished {} in {:.3}s", self.operation, elapsed.as_secs_f64());
        elapsed
    }

    pub fn finish_with_count(self, count: usize) -> PerformanceMetrics {
        let metrics = PerformanceMetrics::new(&self.operation, count, self.elapsed());
        info!("{}", metrics.format());
        metrics
    }

    /// Warn once `threshold` has passed; returns whether it did.
    pub fn warn_if_slow(&self, threshold: Duration, what: &str) -> bool {
        let elapsed = self.elapsed();
        if elapsed > threshold {
            warn!(
                "{} in {} took {:.2}s (threshold {:.2}s)",
                what,
                self.operation,
                elapsed.as_secs_f64(),
                threshold.as_secs_f64()
            );
            return true;
        }
        false
    }
}

/// Throughput of a run over many queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub operation: String,
    pub queries: usize,
    pub duration_ms: u64,
    pub queries_per_sec: f64,
    pub avg_query_ms: f64,
}

impl PerformanceMetrics {
    pub fn new(operation: &str, queries: usize, duration: Duration) -> Self {
        let duration_ms = duration.as_millis() as u64;
        let secs = duration.as_secs_f64();

        Self {
            operation: operation.to_string(),
            queries,
            duration_ms,
            queries_per_sec: if secs > 0.0 { queries as f64 / secs } else { 0.0 },
            avg_query_ms: if queries > 0 {
                duration_ms as f64 / queries as f64
            } else {
                0.0
            },
        }
    }

    pub fn format(&self) -> String {
        format!(
            "{}: {} queries in {}ms ({:.2} queries/sec, {:.2}ms per query)",
            self.operation, self.queries, self.duration_ms, self.queries_per_sec, self.avg_query_ms
        )
    }
}

/// Expression tree size before and after simplification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplificationStats {
    pub raw_size: usize,
    pub simplified_size: usize,
}

impl SimplificationStats {
    pub fn measure<T: Ord + Clone>(raw: &Expression<T>, simplified: &Expression<T>) -> Self {
        Self {
            raw_size: raw.size(),
            simplified_size: simplified.size(),
        }
    }

    /// Fraction of nodes removed.
    pub fn reduction(&self) -> f64 {
        if self.raw_size == 0 {
            return 0.0;
        }
        1.0 - self.simplified_size as f64 / self.raw_size as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_metrics() {
        let metrics = PerformanceMetrics::new("batch", 100, Duration::from_secs(10));
        assert_eq!(metrics.queries, 100);
        assert_eq!(metrics.queries_per_sec, 10.0);
        assert_eq!(metrics.avg_query_ms, 100.0);

        let empty = PerformanceMetrics::new("batch", 0, Duration::ZERO);
        assert_eq!(empty.queries_per_sec, 0.0);
        assert_eq!(empty.avg_query_ms, 0.0);
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test");
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.finish();
        assert!(elapsed >= Duration::from_millis(10));
    }

    #[test]
    fn test_warn_if_slow() {
        let timer = OperationTimer::new("fit");
        assert!(!timer.warn_if_slow(Duration::from_secs(3600), "counting"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.warn_if_slow(Duration::from_millis(1), "counting"));
    }

    #[test]
    fn test_simplification_stats() {
        let raw: Expression<u8> = Expression::marginal([], Expression::product(vec![Expression::prob([1])]));
        let simplified = Expression::prob([1]);
        let stats = SimplificationStats::measure(&raw, &simplified);
        assert_eq!(stats.raw_size, 3);
        assert_eq!(stats.simplified_size, 1);
        assert!((stats.reduction() - 2.0 / 3.0).abs() < 1e-12);
    }
}
