use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("pipeline event payload is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
