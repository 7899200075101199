//! # Commands
//!
//! One function per CLI subcommand. Everything a command needs is built once into a
//! [`Context`] from the loaded [`Config`].

mod collect;
mod history;
mod report;
mod run;
mod universes;

pub use collect::collect;
pub use history::history;
pub use report::{
    post_recap,
    publish,
    render,
};
pub use run::run;
pub use universes::list_universes;

use chrono::{
    DateTime,
    NaiveDate,
    Utc,
};
use color_eyre::Result;
use eyre::Context as _;
use ogame_stats_config::Config;
use ogame_stats_core::{
    http_client,
    Error as CoreError,
    Store,
    Universe,
};
use ogame_stats_report::Error as ReportError;
use reqwest::Client;

/// Configuration plus the handles built from it.
pub struct Context {
    pub config: Config,
    pub store: Store,
    pub http: Client,
}

impl Context {
    /// Validates `config`, opens the database and builds the HTTP client.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let http = http_client(&config.http)?;
        let store = Store::open(&config.storage.database)
            .await
            .wrap_err_with(|| format!("Failed to open database {}", config.storage.database.display()))?;
        Ok(Self { config, store, http })
    }

    /// Server id of the configured universe, without asking the lobby.
    pub fn server_id(&self) -> Result<String> {
        let community = self.config.community();
        match &self.config.universe.base_url {
            Some(base_url) => Ok(Universe::from_override(base_url, &self.config.universe.server_id, &community)?.server_id),
            None => Ok(self.config.universe.server_id.trim().to_lowercase()),
        }
    }

    /// Today in the report timezone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.config.timezone.report).date_naive()
    }
}

/// The core error behind a report, also when wrapped by the report crate.
fn core_error(report: &eyre::Report) -> Option<&CoreError> {
    report.chain().find_map(|e| {
        e.downcast_ref::<CoreError>().or_else(|| match e.downcast_ref::<ReportError>() {
            Some(ReportError::Store(inner)) => Some(inner),
            _ => None,
        })
    })
}

/// Process exit code for a failed command.
///
/// | code | failure |
/// |------|---------|
/// | 2 | universe cannot be resolved |
/// | 3 | player cannot be resolved |
/// | 4 | lobby or universe API unreachable or unusable |
/// | 5 | collection run stored nothing |
/// | 1 | anything else |
pub fn exit_code(report: &eyre::Report) -> u8 {
    match core_error(report) {
        Some(e) if e.is_universe_error() => 2,
        Some(CoreError::PlayerNotFound { .. }) => 3,
        Some(e) if e.is_api_error() => 4,
        Some(CoreError::RunFailed { .. }) => 5,
        _ => 1,
    }
}
