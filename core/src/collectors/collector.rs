use crate::error::Result;
use chrono::{
    DateTime,
    Utc,
};
use std::{
    future::Future,
    pin::Pin,
};

/// A step of a collection run that gathers data and can describe what it gathered.
pub trait Collector {
    /// Collect data, stamping it with `collected_at` (informational only).
    fn collect(&mut self, collected_at: DateTime<Utc>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Format the last collection for the terminal
    fn format(&self) -> String;

    /// The last collection as JSON
    fn summary(&self) -> serde_json::Value;

    fn name(&self) -> &'static str;
}
