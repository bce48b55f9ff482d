use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tuning knobs for a session's metrics aggregator.
///
/// Deserializable so hosts can embed it in their own configuration files;
/// the defaults match the pipeline's expected load.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Maximum retained entries per series
    pub series_capacity: usize,
    /// Trailing window applied when the caller does not pass one
    pub default_window_hours: u64,
}

impl AggregatorConfig {
    pub fn default_window(&self) -> Duration {
        // chrono::Duration tops out at i64::MAX milliseconds; clamp so an
        // absurd configured window cannot panic the aggregator.
        const MAX_WINDOW_HOURS: u64 = (i64::MAX / (3_600 * 1_000)) as u64;
        Duration::hours(self.default_window_hours.min(MAX_WINDOW_HOURS) as i64)
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            series_capacity: 1000,
            default_window_hours: 24,
        }
    }
}

/// Point-in-time aggregation over the trailing window.
///
/// Derived at query time, never stored. Figures are rounded to two decimal
/// places for presentation stability; an empty window yields zeros rather
/// than an error so "no data yet" and "nothing recorded" render identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Mean time-to-first-token over the window, milliseconds
    pub avg_ttft_ms: f64,
    /// Mean generation throughput over the window, tokens per second
    pub avg_tokens_per_second: f64,
    /// Errors as a percentage of windowed calls, in [0, 100]
    pub error_rate_pct: f64,
    pub ttft_samples: usize,
    pub throughput_samples: usize,
    pub error_samples: usize,
    /// Minutes since the session started
    pub session_duration_min: f64,
    /// Lifetime model invocations, not windowed
    pub total_llm_calls: u64,
    /// Lifetime errors, not windowed
    pub total_errors: u64,
    /// Set when statistics could not be computed and were zeroed
    pub degraded: bool,
}

impl MetricsSnapshot {
    pub(crate) fn degraded(
        ttft_samples: usize,
        throughput_samples: usize,
        error_samples: usize,
        session_duration_min: f64,
        total_llm_calls: u64,
        total_errors: u64,
    ) -> Self {
        Self {
            avg_ttft_ms: 0.0,
            avg_tokens_per_second: 0.0,
            error_rate_pct: 0.0,
            ttft_samples,
            throughput_samples,
            error_samples,
            session_duration_min,
            total_llm_calls,
            total_errors,
            degraded: true,
        }
    }
}

/// Round to two decimal places for snapshot presentation.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
