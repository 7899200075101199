pub mod metric_type;
pub mod snapshot;

pub use metric_type::MetricType;
pub use snapshot::*;
