//! # OGame statistics reports
//!
//! Everything downstream of collection: deltas over the stored history, the HTML/terminal
//! report, publishing to a static site, alerts and the daily Discord recap. Snapshots are only
//! ever read here, through [`ogame_stats_core::SnapshotStore`].

#[macro_use]
extern crate tracing;

pub mod aggregate;
pub mod alerts;
pub mod error;
pub mod publish;
pub mod recap;
pub mod render;
mod templates;
pub mod webhook;

pub use aggregate::{
    Delta,
    MetricHistory,
};
pub use alerts::{
    Alert,
    AlertKind,
    AlertSubject,
};
pub use error::{
    Error,
    Result,
};
pub use publish::{
    find_latest_report,
    join_public_url,
    publish_report,
    PublishResult,
};
pub use recap::{
    recap_payload,
    ReportLinks,
};
pub use render::{
    recap_window,
    render_html,
    render_table,
    write_report,
    RecapWindow,
    ReportContext,
    ReportData,
};
pub use webhook::{
    Delivery,
    DiscordWebhook,
};
