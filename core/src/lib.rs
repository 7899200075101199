//! # OGame statistics core
//!
//! Collects a player's highscore standings from a universe's public API and keeps them as a
//! deduplicated, append-only snapshot history.
//!
//! ## Architecture
//!
//! - **`directory`**: resolves a community or server id to a universe through the lobby
//! - **`api`**: `highscore.xml` / `players.xml` client and parsers
//! - **`normalizer`**: resolves source timestamps to UTC instants
//! - **`ingest`**: insert-if-absent over a batch, counting inserted/duplicate/failed
//! - **`store`**: SQLite snapshot store, player cache, universe table, alert log and job state
//! - **`collectors`**: the `Collector` steps and the `Orchestrator` running a whole collection
//!
//! Data flows directory → api → normalizer → ingest → store. Everything downstream reads the
//! store through [`SnapshotStore`] only.

#[macro_use]
extern crate tracing;

pub mod api;
pub mod collectors;
pub mod directory;
pub mod error;
pub mod http;
pub mod ingest;
pub mod metrics;
pub mod normalizer;
pub mod players;
pub mod store;

pub use collectors::*;
pub use directory::{
    DirectoryClient,
    Universe,
};
pub use error::{
    Error,
    MetricFailure,
    Result,
};
pub use http::http_client;
pub use ingest::{
    IngestResult,
    Ingestor,
};
pub use metrics::*;
pub use normalizer::Normalizer;
pub use store::{
    AlertRecord,
    RenderState,
    SnapshotStore,
    Store,
};
