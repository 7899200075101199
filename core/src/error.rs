use crate::metrics::MetricType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a single metric type within a run. Collected into the run summary rather than
/// raised, so one broken category never hides the others.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricFailure {
    pub metric_type: MetricType,
    pub reason: String,
}

impl MetricFailure {
    /// Per-metric reason of `error`, without the metric type prefix its message carries.
    pub fn from_error(metric_type: MetricType, error: &Error) -> Self {
        let reason = match error {
            Error::MetricFetchFailed { reason, .. } | Error::NormalizationFailed { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        Self { metric_type, reason }
    }
}

impl std::fmt::Display for MetricFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.metric_type, self.reason)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Universe directory unavailable at {url}: {reason}")]
    DirectoryUnavailable { url: String, reason: String },
    #[error("Universe not found: {0}")]
    UniverseNotFound(String),
    #[error("Player not found: {name:?}{}", suggestions_suffix(.suggestions))]
    PlayerNotFound { name: String, suggestions: Vec<String> },
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Unparsable {what} payload: {reason}")]
    Payload { what: &'static str, reason: String },
    #[error("Fetching {metric_type} failed: {reason}")]
    MetricFetchFailed { metric_type: MetricType, reason: String },
    #[error("Observation for {metric_type} rejected: {reason}")]
    NormalizationFailed { metric_type: MetricType, reason: String },
    #[error("Writing snapshot failed: {0}")]
    StoreWriteFailed(String),
    #[error("Collection run for {server_id} failed: {}", join_failures(.failures))]
    RunFailed {
        server_id: String,
        failures: Vec<MetricFailure>,
    },
    #[error("Unknown metric type {0:?}")]
    UnknownMetric(String),
    #[error("Stored row is corrupt: {0}")]
    CorruptRow(String),
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is about locating the universe (lobby or configuration).
    pub fn is_universe_error(&self) -> bool {
        matches!(self, Error::UniverseNotFound(_))
    }

    /// Whether the failure came from talking to a remote endpoint.
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            Error::DirectoryUnavailable { .. }
                | Error::Http { .. }
                | Error::Status { .. }
                | Error::Payload { .. }
                | Error::MetricFetchFailed { .. }
        )
    }
}

fn suggestions_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(". Did you mean: {}?", suggestions.join(", "))
    }
}

fn join_failures(failures: &[MetricFailure]) -> String {
    if failures.is_empty() {
        return "nothing was stored".to_string();
    }
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
