use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use pipeline_core::PipelineEvent;
use tokio::sync::mpsc;

use crate::aggregator::SessionAggregator;

/// Worker that drains pipeline events from the bus into the aggregator
pub struct MetricsWorker {
    aggregator: Arc<SessionAggregator>,
    running: Arc<AtomicBool>,
}

impl MetricsWorker {
    pub fn new(aggregator: Arc<SessionAggregator>) -> Self {
        Self {
            aggregator,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the worker task
    ///
    /// Returns a handle to stop the worker
    pub fn spawn(&self, mut receiver: mpsc::Receiver<PipelineEvent>) -> Arc<AtomicBool> {
        let aggregator = Arc::clone(&self.aggregator);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let running_clone = Arc::clone(&running);

        tokio::spawn(async move {
            info!("MetricsWorker started");

            while running.load(Ordering::SeqCst) {
                match receiver.recv().await {
                    Some(event) => aggregator.apply(&event),
                    None => {
                        info!("MetricsWorker channel closed");
                        break;
                    }
                }
            }

            info!("MetricsWorker stopped");
        });

        running_clone
    }

    /// Stop the worker gracefully
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MetricsBus;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn worker_feeds_bus_events_into_the_aggregator() {
        let aggregator = Arc::new(SessionAggregator::new());
        let worker = MetricsWorker::new(Arc::clone(&aggregator));
        let (bus, rx) = MetricsBus::new(100);

        let running = worker.spawn(rx);

        bus.emit_json(&json!({"ttft": 120.0, "tokens_per_second": 40.0}));
        bus.emit_json(&json!({"error": "generation_error"}));
        bus.emit_json(&json!({"unrelated": true}));

        // wait for processing
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let snapshot = aggregator.snapshot_with(Duration::hours(1));
        assert_eq!(snapshot.total_llm_calls, 1);
        assert_eq!(snapshot.ttft_samples, 1);
        assert_eq!(snapshot.throughput_samples, 1);
        assert_eq!(snapshot.error_samples, 1);
        assert_eq!(snapshot.avg_ttft_ms, 120.0);
        assert_eq!(snapshot.avg_tokens_per_second, 40.0);
        assert_eq!(snapshot.error_rate_pct, 50.0);

        running.store(false, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn worker_stops_when_the_bus_closes() {
        let aggregator = Arc::new(SessionAggregator::new());
        let worker = MetricsWorker::new(Arc::clone(&aggregator));
        let (bus, rx) = MetricsBus::new(10);

        let _running = worker.spawn(rx);

        bus.emit(PipelineEvent::fault("x"));
        drop(bus);

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let snapshot = aggregator.snapshot_with(Duration::hours(1));
        assert_eq!(snapshot.total_errors, 1);
    }
}
