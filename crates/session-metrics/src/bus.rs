use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::warn;
use pipeline_core::PipelineEvent;
use serde_json::Value;
use tokio::sync::mpsc;

/// Category recorded when a raw payload cannot be classified at all.
pub const EVENT_DECODE_ERROR: &str = "event_decode_error";

/// Fan-in point for pipeline events, backed by a bounded channel.
///
/// Emission never waits: when the channel is full the event is discarded
/// and the loss is counted, so a slow consumer can never stall the pipeline
/// it observes.
pub struct MetricsBus {
    tx: mpsc::Sender<PipelineEvent>,
    dropped: Arc<AtomicU64>,
}

impl MetricsBus {
    /// Open a bus with the given channel capacity.
    ///
    /// The returned receiver is the consuming half, meant to be handed to a
    /// worker; clones of the bus all feed the same receiver.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Queue a classified event without blocking. A full channel costs the
    /// event, not the caller; the drop shows up in [`dropped_count`](Self::dropped_count).
    pub fn emit(&self, event: PipelineEvent) {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Classify a raw pipeline payload and emit it.
    ///
    /// A payload that cannot be classified at all is reported as a fault so
    /// it still shows up in the error rate instead of vanishing.
    pub fn emit_json(&self, payload: &Value) {
        match PipelineEvent::from_json(payload) {
            Ok(event) => self.emit(event),
            Err(error) => {
                warn!("failed to decode pipeline event: {}", error);
                self.emit(PipelineEvent::fault(EVENT_DECODE_ERROR));
            }
        }
    }

    /// How many events have been discarded over the bus's lifetime.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True once the consuming half has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Clone for MetricsBus {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}
