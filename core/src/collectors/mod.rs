//! # Collectors
//!
//! - **`Collector` trait**: a step that gathers data and reports on it
//! - **`HighscoreCollector`**: fetches one highscore listing per metric type and extracts the
//!   tracked player's rows
//! - **`Orchestrator`**: one full run: universe, player, fetch, normalize, ingest

pub mod collector;
pub mod highscore_collector;
pub mod orchestrator;

pub use collector::Collector;
pub use highscore_collector::{
    FetchedHighscores,
    HighscoreCollector,
};
pub use orchestrator::{
    Orchestrator,
    RunSummary,
};
