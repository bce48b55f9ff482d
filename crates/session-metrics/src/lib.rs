pub mod aggregator;
pub mod bus;
pub mod series;
pub mod types;
pub mod worker;

pub use aggregator::{SessionAggregator, METRIC_PROCESSING_ERROR};
pub use bus::{MetricsBus, EVENT_DECODE_ERROR};
pub use series::BoundedSeries;
pub use types::{AggregatorConfig, MetricsSnapshot};
pub use worker::MetricsWorker;
