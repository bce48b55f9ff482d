use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EventDecodeError;

/// Metadata attached to every pipeline event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMeta {
    /// Unique event ID (UUID v4)
    pub event_id: String,
    /// When the event occurred
    pub occurred_at: DateTime<Utc>,
}

impl EventMeta {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            occurred_at,
        }
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// One logical model invocation, as reported by the pipeline.
///
/// A single invocation may carry a first-token latency, a token throughput,
/// both, or neither, and may additionally report an error that occurred
/// alongside the measurements; every present field becomes its own
/// observation sharing this event's timestamp. Fields that were present on
/// the raw payload but not numeric are listed in `malformed` so the consumer
/// can record them as internal errors instead of silently losing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationMetrics {
    pub meta: EventMeta,
    /// Time to first token, milliseconds
    pub ttft_ms: Option<f64>,
    /// Generation throughput, tokens per second
    pub tokens_per_second: Option<f64>,
    /// Recognized fields that could not be read as numbers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed: Vec<String>,
    /// Error reported on the same payload as the measurements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An error reported by the upstream pipeline (model or transport failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultMetrics {
    pub meta: EventMeta,
    /// Short free-form label identifying the error cause,
    /// e.g. "generation_error"
    pub category: String,
}

/// A pipeline event classified once at the boundary.
///
/// The raw payloads emitted by the pipeline are heterogeneous; rather than
/// probing for optional fields at every use site, `from_json` decides the
/// shape a single time and the rest of the system matches on this enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Invocation(InvocationMetrics),
    Fault(FaultMetrics),
    /// An object that carried none of the recognized fields. Ignored
    /// downstream.
    Unknown { meta: EventMeta },
}

impl PipelineEvent {
    pub fn invocation(ttft_ms: Option<f64>, tokens_per_second: Option<f64>) -> Self {
        Self::Invocation(InvocationMetrics {
            meta: EventMeta::new(),
            ttft_ms,
            tokens_per_second,
            malformed: Vec::new(),
            error: None,
        })
    }

    pub fn fault(category: impl Into<String>) -> Self {
        Self::Fault(FaultMetrics {
            meta: EventMeta::new(),
            category: category.into(),
        })
    }

    /// Classify a raw pipeline payload.
    ///
    /// Recognized fields: `error` (string), `ttft` / `ttft_ms` (number,
    /// milliseconds), `tokens_per_second` (number). Every recognized field
    /// on the same object is kept as its own observation sharing one
    /// timestamp, and an object carrying metric fields still counts as one
    /// logical call no matter how many it carries. A payload with only an
    /// `error` field classifies as a `Fault`; one with metrics and an error
    /// stays a single `Invocation` carrying both.
    pub fn from_json(payload: &Value) -> Result<Self, EventDecodeError> {
        Self::from_json_at(payload, Utc::now())
    }

    pub fn from_json_at(payload: &Value, at: DateTime<Utc>) -> Result<Self, EventDecodeError> {
        let object = payload
            .as_object()
            .ok_or_else(|| EventDecodeError::NotAnObject(payload.to_string()))?;

        let error = object.get("error").map(|value| {
            value
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| value.to_string())
        });

        let mut malformed = Vec::new();
        let ttft_ms = read_metric_field(object, &["ttft_ms", "ttft"], &mut malformed);
        let tokens_per_second = read_metric_field(object, &["tokens_per_second"], &mut malformed);

        if ttft_ms.is_none() && tokens_per_second.is_none() && malformed.is_empty() {
            return Ok(match error {
                Some(category) => Self::Fault(FaultMetrics {
                    meta: EventMeta::at(at),
                    category,
                }),
                None => Self::Unknown {
                    meta: EventMeta::at(at),
                },
            });
        }

        Ok(Self::Invocation(InvocationMetrics {
            meta: EventMeta::at(at),
            ttft_ms,
            tokens_per_second,
            malformed,
            error,
        }))
    }

    pub fn meta(&self) -> &EventMeta {
        match self {
            Self::Invocation(metrics) => &metrics.meta,
            Self::Fault(fault) => &fault.meta,
            Self::Unknown { meta } => meta,
        }
    }
}

fn read_metric_field(
    object: &serde_json::Map<String, Value>,
    names: &[&str],
    malformed: &mut Vec<String>,
) -> Option<f64> {
    for name in names {
        let Some(value) = object.get(*name) else {
            continue;
        };
        match value.as_f64() {
            Some(number) => return Some(number),
            None => {
                malformed.push((*name).to_string());
                return None;
            }
        }
    }
    None
}
