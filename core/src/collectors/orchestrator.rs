use crate::{
    api::OGameApiClient,
    collectors::{
        Collector,
        HighscoreCollector,
    },
    directory::{
        DirectoryClient,
        Universe,
    },
    error::{
        Error,
        MetricFailure,
        Result,
    },
    ingest::{
        IngestResult,
        Ingestor,
    },
    metrics::MetricType,
    normalizer::Normalizer,
    players::PlayerResolver,
    store::{
        SnapshotStore,
        Store,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use comfy_table::{
    presets,
    Attribute,
    Cell,
    Color,
    ContentArrangement,
    Table,
};
use ogame_stats_config::Config;
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};

/// What one collection run did. Returned even when some metric types failed.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub server_id: String,
    pub universe_name: String,
    pub player_name: String,
    pub player_id: i64,
    pub collected_at: DateTime<Utc>,
    pub requested: Vec<MetricType>,
    /// Fetch and normalization failures, one per metric type.
    pub metric_failures: Vec<MetricFailure>,
    pub ingest: IngestResult,
}

impl RunSummary {
    pub fn failed_metric_types(&self) -> Vec<MetricType> {
        self.metric_failures.iter().map(|f| f.metric_type).collect()
    }
}

/// Runs the collection pipeline for the universe/player pair of one [`Config`].
///
/// Universe and player metadata go to the [`Store`]; snapshots go through a [`SnapshotStore`],
/// which is the same store unless replaced with [`Orchestrator::with_snapshot_store`].
pub struct Orchestrator {
    config: Config,
    store: Store,
    snapshots: Arc<dyn SnapshotStore>,
    http: HttpClient,
    summary: Option<RunSummary>,
}

impl Orchestrator {
    pub fn new(config: Config, store: Store, http: HttpClient) -> Self {
        Self {
            config,
            snapshots: Arc::new(store.clone()),
            store,
            http,
            summary: None,
        }
    }

    pub fn with_snapshot_store(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn last_summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// A configured `universe.base_url` is used as is; otherwise `universe.server_id` is looked
    /// up in the lobby.
    pub async fn resolve_universe(&self) -> Result<Universe> {
        let community = self.config.community();
        if let Some(base_url) = &self.config.universe.base_url {
            return Universe::from_override(base_url, &self.config.universe.server_id, &community);
        }

        let server_id = self.config.universe.server_id.trim();
        if server_id.is_empty() {
            return Err(Error::UniverseNotFound(
                "universe.server_id is required (use list-universes to find it)".to_string(),
            ));
        }
        DirectoryClient::new(self.config.http.lobby_url.clone(), self.http.clone())
            .resolve_one(server_id)
            .await
    }

    /// One run: resolve, fetch every selected metric type, normalize, ingest.
    ///
    /// Partial failures are reported in the summary. [`Error::RunFailed`] is returned only when
    /// the run stored nothing and found nothing already stored.
    pub async fn run(&self, collected_at: DateTime<Utc>) -> Result<RunSummary> {
        let metric_types = MetricType::parse_selection(&self.config.metrics)?;
        let universe = self.resolve_universe().await?;
        self.store.universes().upsert(&universe, collected_at).await?;
        info!(server_id = %universe.server_id, name = %universe.name, "Universe resolved");

        let api = OGameApiClient::new(universe.base_url.clone(), self.http.clone());
        let player = PlayerResolver::new(&self.store, &api, &universe.server_id)
            .resolve(&self.config.player_name, collected_at)
            .await?;
        debug!(player_id = player.player_id, name = %player.name, "Player resolved");

        let mut collector = HighscoreCollector::new(
            api,
            universe.server_id.clone(),
            player.player_id,
            metric_types.clone(),
        );
        collector.collect(collected_at).await?;
        let fetched = collector.into_fetched();
        let mut metric_failures = fetched.failures;

        if fetched.observations.is_empty() {
            error!(server_id = %universe.server_id, failed = metric_failures.len(), "No metric type could be fetched");
            return Err(Error::RunFailed {
                server_id: universe.server_id,
                failures: metric_failures,
            });
        }

        let normalizer = Normalizer::new(self.config.timezone.source);
        let mut candidates = Vec::with_capacity(fetched.observations.len());
        for observation in &fetched.observations {
            match normalizer.normalize(observation) {
                Ok(snapshot) => candidates.push(snapshot),
                Err(e) => {
                    warn!(metric_type = %observation.metric_type, error = %e, "Observation skipped");
                    metric_failures.push(MetricFailure::from_error(observation.metric_type, &e));
                }
            }
        }

        let ingest = Ingestor::new(self.snapshots.as_ref()).ingest(&candidates).await;
        if candidates.is_empty() || ingest.is_total_store_failure() {
            // Every candidate failed to write, so failures line up with candidates.
            let mut failures = metric_failures;
            failures.extend(candidates.iter().zip(&ingest.failures).map(|(c, reason)| MetricFailure {
                metric_type: c.metric_type(),
                reason: reason.clone(),
            }));
            error!(server_id = %universe.server_id, failed = failures.len(), "Collection run stored nothing");
            return Err(Error::RunFailed {
                server_id: universe.server_id,
                failures,
            });
        }

        info!(
            server_id = %universe.server_id,
            player = %player.name,
            inserted = ingest.inserted,
            duplicates = ingest.duplicates,
            failed = ingest.failed,
            failed_metrics = metric_failures.len(),
            "Collection run finished"
        );

        Ok(RunSummary {
            server_id: universe.server_id,
            universe_name: universe.name,
            player_name: player.name,
            player_id: player.player_id,
            collected_at,
            requested: metric_types,
            metric_failures,
            ingest,
        })
    }
}

impl Collector for Orchestrator {
    fn collect(&mut self, collected_at: DateTime<Utc>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let summary = self.run(collected_at).await?;
            self.summary = Some(summary);
            Ok(())
        })
    }

    fn format(&self) -> String {
        let summary = match &self.summary {
            Some(s) => s,
            None => return "No collection run yet.".to_string(),
        };

        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![Cell::new(format!(
                "Collection {} / {}",
                summary.server_id, summary.player_name
            ))
            .add_attribute(Attribute::Bold)
            .fg(Color::Cyan)]);

        table.add_row(vec![
            Cell::new("Universe").add_attribute(Attribute::Bold),
            Cell::new(&summary.universe_name),
        ]);
        table.add_row(vec![
            Cell::new("Collected at").add_attribute(Attribute::Bold),
            Cell::new(summary.collected_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ]);
        table.add_row(vec![
            Cell::new("Inserted").add_attribute(Attribute::Bold),
            Cell::new(summary.ingest.inserted).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Already stored").add_attribute(Attribute::Bold),
            Cell::new(summary.ingest.duplicates),
        ]);
        table.add_row(vec![
            Cell::new("Write failures").add_attribute(Attribute::Bold),
            Cell::new(summary.ingest.failed).fg(if summary.ingest.failed > 0 {
                Color::Red
            } else {
                Color::Reset
            }),
        ]);
        for failure in &summary.metric_failures {
            table.add_row(vec![
                Cell::new(failure.metric_type.label()).fg(Color::Red),
                Cell::new(&failure.reason),
            ]);
        }

        format!("{table}\n")
    }

    fn summary(&self) -> serde_json::Value {
        serde_json::to_value(&self.summary).unwrap_or_default()
    }

    fn name(&self) -> &'static str {
        "Orchestrator"
    }
}
