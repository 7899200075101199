use crate::{
    api::OGameApiClient,
    collectors::Collector,
    error::{
        Error,
        MetricFailure,
        Result,
    },
    metrics::{
        MetricType,
        RawObservation,
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
use futures::future::join_all;
use std::{
    future::Future,
    pin::Pin,
};

/// Outcome of one fetch round: an observation per metric type that worked, a failure per one
/// that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedHighscores {
    pub observations: Vec<RawObservation>,
    pub failures: Vec<MetricFailure>,
}

/// Fetches the highscore listings of the selected metric types concurrently. Each metric type
/// succeeds or fails on its own; the collector itself only fails when nothing was requested.
pub struct HighscoreCollector {
    api: OGameApiClient,
    server_id: String,
    player_id: i64,
    metric_types: Vec<MetricType>,
    fetched: Option<FetchedHighscores>,
}

impl HighscoreCollector {
    pub fn new(api: OGameApiClient, server_id: String, player_id: i64, metric_types: Vec<MetricType>) -> Self {
        Self {
            api,
            server_id,
            player_id,
            metric_types,
            fetched: None,
        }
    }

    pub fn fetched(&self) -> Option<&FetchedHighscores> {
        self.fetched.as_ref()
    }

    pub fn into_fetched(self) -> FetchedHighscores {
        self.fetched.unwrap_or_default()
    }

    async fn fetch_one(&self, metric_type: MetricType, collected_at: DateTime<Utc>) -> Result<RawObservation> {
        let failure = |reason: String| Error::MetricFetchFailed { metric_type, reason };

        let listing = self
            .api
            .fetch_highscore(metric_type)
            .await
            .map_err(|e| failure(e.to_string()))?;
        let entry = listing
            .find(self.player_id)
            .copied()
            .ok_or_else(|| failure(format!("player {} is not ranked in this listing", self.player_id)))?;

        Ok(RawObservation {
            server_id: self.server_id.clone(),
            player_id: self.player_id,
            metric_type,
            source_timestamp: listing.timestamp,
            entry,
            collected_at,
        })
    }
}

impl Collector for HighscoreCollector {
    fn collect(&mut self, collected_at: DateTime<Utc>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let results = join_all(
                self.metric_types
                    .iter()
                    .map(|metric_type| self.fetch_one(*metric_type, collected_at)),
            )
            .await;

            let mut fetched = FetchedHighscores::default();
            for (metric_type, result) in self.metric_types.iter().zip(results) {
                match result {
                    Ok(observation) => fetched.observations.push(observation),
                    Err(e) => {
                        warn!(%metric_type, error = %e, "Metric fetch failed");
                        fetched.failures.push(MetricFailure::from_error(*metric_type, &e));
                    }
                }
            }
            debug!(
                ok = fetched.observations.len(),
                failed = fetched.failures.len(),
                "Highscores fetched"
            );

            self.fetched = Some(fetched);
            Ok(())
        })
    }

    fn format(&self) -> String {
        let fetched = match &self.fetched {
            Some(f) => f,
            None => return "Nothing fetched yet.".to_string(),
        };

        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Metric").add_attribute(Attribute::Bold).fg(Color::Cyan),
                Cell::new("Rank").add_attribute(Attribute::Bold),
                Cell::new("Points").add_attribute(Attribute::Bold),
                Cell::new("API timestamp").add_attribute(Attribute::Bold),
            ]);

        for observation in &fetched.observations {
            table.add_row(vec![
                Cell::new(observation.metric_type.label()),
                Cell::new(observation.entry.rank),
                Cell::new(observation.entry.points),
                Cell::new(observation.source_timestamp.to_string()),
            ]);
        }
        for failure in &fetched.failures {
            table.add_row(vec![
                Cell::new(failure.metric_type.label()),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(&failure.reason).fg(Color::Red),
            ]);
        }

        format!("{table}\n")
    }

    fn summary(&self) -> serde_json::Value {
        let Some(fetched) = &self.fetched else {
            return serde_json::Value::Null;
        };
        serde_json::json!({
            "server_id": self.server_id,
            "player_id": self.player_id,
            "fetched": fetched.observations.iter().map(|o| serde_json::json!({
                "metric_type": o.metric_type,
                "rank": o.entry.rank,
                "points": o.entry.points,
                "source_timestamp": o.source_timestamp.to_string(),
            })).collect::<Vec<_>>(),
            "failures": fetched.failures,
        })
    }

    fn name(&self) -> &'static str {
        "HighscoreCollector"
    }
}
