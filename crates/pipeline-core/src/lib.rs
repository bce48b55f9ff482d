pub mod chunk;
pub mod error;
pub mod events;

pub use chunk::{adapter_for, ChunkAdapter, ChunkFormat};
pub use error::EventDecodeError;
pub use events::{EventMeta, FaultMetrics, InvocationMetrics, PipelineEvent};
