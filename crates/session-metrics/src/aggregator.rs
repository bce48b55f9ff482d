use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use pipeline_core::PipelineEvent;

use crate::series::BoundedSeries;
use crate::types::{round2, AggregatorConfig, MetricsSnapshot};

/// Error category recorded when an observation cannot be interpreted.
pub const METRIC_PROCESSING_ERROR: &str = "metric_processing_error";

struct Inner {
    ttft_ms: BoundedSeries<f64>,
    tokens_per_second: BoundedSeries<f64>,
    errors: BoundedSeries<String>,
    total_llm_calls: u64,
    total_errors: u64,
}

/// Rolling performance metrics for one conversational session.
///
/// Owned by the session object, created at session start and discarded with
/// it; nothing is persisted. Ingestion and queries are safe to call from
/// concurrent tasks: all mutable state sits behind a single lock so an
/// append-and-evict sequence can never interleave, and snapshots copy the
/// windowed entries out before computing statistics so the lock is held only
/// for the copy.
///
/// Metrics collection must never destabilize the session it observes, so no
/// operation here returns an error: malformed observations are skipped and
/// counted as internal errors, and a failed aggregation degrades the
/// snapshot instead of propagating.
pub struct SessionAggregator {
    started_at: DateTime<Utc>,
    default_window: Duration,
    inner: Mutex<Inner>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::with_config(AggregatorConfig::default())
    }

    pub fn with_config(config: AggregatorConfig) -> Self {
        Self::with_config_at(config, Utc::now())
    }

    pub fn with_config_at(config: AggregatorConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            default_window: config.default_window(),
            inner: Mutex::new(Inner {
                ttft_ms: BoundedSeries::new(config.series_capacity),
                tokens_per_second: BoundedSeries::new(config.series_capacity),
                errors: BoundedSeries::new(config.series_capacity),
                total_llm_calls: 0,
                total_errors: 0,
            }),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Record the measurements of one logical model invocation.
    ///
    /// A single invocation may report a first-token latency, a throughput,
    /// or both; either way the lifetime call counter moves by at most one.
    /// Values that are not finite non-negative numbers are skipped and
    /// recorded as internal error observations.
    pub fn record_invocation(&self, ttft_ms: Option<f64>, tokens_per_second: Option<f64>) {
        self.record_invocation_at(ttft_ms, tokens_per_second, Utc::now());
    }

    pub fn record_invocation_at(
        &self,
        ttft_ms: Option<f64>,
        tokens_per_second: Option<f64>,
        at: DateTime<Utc>,
    ) {
        let mut inner = self.lock();
        let mut recorded = false;

        if let Some(value) = ttft_ms {
            if is_valid_measurement(value) {
                inner.ttft_ms.push(at, value);
                recorded = true;
            } else {
                warn!("skipping invalid ttft measurement: {}", value);
                inner.errors.push(at, METRIC_PROCESSING_ERROR.to_string());
                inner.total_errors += 1;
            }
        }

        if let Some(value) = tokens_per_second {
            if is_valid_measurement(value) {
                inner.tokens_per_second.push(at, value);
                recorded = true;
            } else {
                warn!("skipping invalid throughput measurement: {}", value);
                inner.errors.push(at, METRIC_PROCESSING_ERROR.to_string());
                inner.total_errors += 1;
            }
        }

        if recorded {
            inner.total_llm_calls += 1;
        }
    }

    pub fn record_latency(&self, value_ms: f64) {
        self.record_invocation(Some(value_ms), None);
    }

    pub fn record_latency_at(&self, value_ms: f64, at: DateTime<Utc>) {
        self.record_invocation_at(Some(value_ms), None, at);
    }

    pub fn record_throughput(&self, tokens_per_second: f64) {
        self.record_invocation(None, Some(tokens_per_second));
    }

    pub fn record_throughput_at(&self, tokens_per_second: f64, at: DateTime<Utc>) {
        self.record_invocation_at(None, Some(tokens_per_second), at);
    }

    pub fn record_error(&self, category: impl Into<String>) {
        self.record_error_at(category, Utc::now());
    }

    pub fn record_error_at(&self, category: impl Into<String>, at: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.errors.push(at, category.into());
        inner.total_errors += 1;
    }

    /// Fire-and-forget error tag. Feeds the same series and lifetime counter
    /// as [`record_error`](Self::record_error).
    pub fn track_error(&self, category: impl Into<String>) {
        self.record_error(category);
    }

    /// Ingest one classified pipeline event.
    pub fn apply(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Invocation(metrics) => {
                self.record_invocation_at(
                    metrics.ttft_ms,
                    metrics.tokens_per_second,
                    metrics.meta.occurred_at,
                );
                for field in &metrics.malformed {
                    warn!("pipeline metric field {:?} was not numeric, skipping", field);
                    self.record_error_at(METRIC_PROCESSING_ERROR, metrics.meta.occurred_at);
                }
                if let Some(category) = &metrics.error {
                    self.record_error_at(category.clone(), metrics.meta.occurred_at);
                }
            }
            PipelineEvent::Fault(fault) => {
                self.record_error_at(fault.category.clone(), fault.meta.occurred_at);
            }
            PipelineEvent::Unknown { meta } => {
                debug!("ignoring pipeline event {} with no metric fields", meta.event_id);
            }
        }
    }

    /// Aggregate over the configured default window, as of now.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_at(self.default_window, Utc::now())
    }

    /// Aggregate over an explicit trailing window, as of now.
    pub fn snapshot_with(&self, window: Duration) -> MetricsSnapshot {
        self.snapshot_at(window, Utc::now())
    }

    pub fn snapshot_at(&self, window: Duration, at: DateTime<Utc>) -> MetricsSnapshot {
        let cutoff = at - window;

        // Copy the windowed entries under the lock, compute after releasing
        // it so ingestion is blocked only for the copy.
        let (ttft, throughput, errors, total_llm_calls, total_errors) = {
            let inner = self.lock();
            (
                inner.ttft_ms.since(cutoff),
                inner.tokens_per_second.since(cutoff),
                inner.errors.since(cutoff),
                inner.total_llm_calls,
                inner.total_errors,
            )
        };

        let session_duration_min =
            round2((at - self.started_at).num_milliseconds() as f64 / 60_000.0);

        let ttft_values: Vec<f64> = ttft.iter().map(|(_, value)| *value).collect();
        let throughput_values: Vec<f64> = throughput.iter().map(|(_, value)| *value).collect();

        // The rounding step can push an otherwise-finite mean out of range,
        // so finiteness is checked on the figures the snapshot will carry.
        let stats = mean(&ttft_values)
            .zip(mean(&throughput_values))
            .map(|(ttft_mean, throughput_mean)| (round2(ttft_mean), round2(throughput_mean)))
            .filter(|(ttft_mean, throughput_mean)| {
                ttft_mean.is_finite() && throughput_mean.is_finite()
            });
        let (avg_ttft_ms, avg_tokens_per_second) = match stats {
            Some(pair) => pair,
            None => {
                warn!("metrics aggregation produced a non-finite statistic, degrading snapshot");
                return MetricsSnapshot::degraded(
                    ttft.len(),
                    throughput.len(),
                    errors.len(),
                    session_duration_min,
                    total_llm_calls,
                    total_errors,
                );
            }
        };

        let denominator = ttft.len() + errors.len();
        let error_rate_pct = if denominator == 0 {
            0.0
        } else {
            errors.len() as f64 / denominator as f64 * 100.0
        };

        MetricsSnapshot {
            avg_ttft_ms,
            avg_tokens_per_second,
            error_rate_pct: round2(error_rate_pct),
            ttft_samples: ttft.len(),
            throughput_samples: throughput.len(),
            error_samples: errors.len(),
            session_duration_min,
            total_llm_calls,
            total_errors,
            degraded: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock must not take metrics down with it.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_measurement(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Arithmetic mean with a zero default for an empty set. `None` when the
/// accumulation overflows to a non-finite value.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return Some(0.0);
    }
    let sum: f64 = values.iter().sum();
    if sum.is_finite() {
        Some(sum / values.len() as f64)
    } else {
        None
    }
}
