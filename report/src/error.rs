use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] ogame_stats_core::Error),
    #[error("{action} {path:?} failed: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Report not found: {0:?}")]
    ReportNotFound(PathBuf),
    #[error("latest_filename must be a file name without path separators, got {0:?}")]
    InvalidLatestFilename(String),
    #[error("Recap time {time} does not exist on {date} in {timezone}")]
    InvalidRecapTime { date: String, time: String, timezone: String },
    #[error("Webhook request failed: {0}")]
    Webhook(#[source] reqwest::Error),
    #[error("Webhook returned HTTP {status}: {body}")]
    WebhookStatus { status: u16, body: String },
    #[error("Template rendering failed: {0}")]
    Template(#[from] minijinja::Error),
}

impl Error {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io { action, path, source }
    }
}
