//! # Universe statistics API
//!
//! Read-only client for a universe's public endpoints (`/api/highscore.xml`, `/api/players.xml`).

pub mod parse;
pub mod types;

use crate::{
    error::Result,
    http::get_text,
    metrics::MetricType,
};
pub use parse::{
    parse_highscore,
    parse_players_xml,
};
use reqwest::Client;
pub use types::*;
use url::Url;

#[derive(Debug, Clone)]
pub struct OGameApiClient {
    base_url: Url,
    http: Client,
}

impl OGameApiClient {
    pub fn new(base_url: Url, http: Client) -> Self {
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Player highscore (`category=1`) for one metric type. One request, the full listing.
    pub async fn fetch_highscore(&self, metric_type: MetricType) -> Result<HighscoreSnapshot> {
        let url = format!(
            "{}?category=1&type={}",
            self.endpoint("highscore.xml"),
            metric_type.highscore_type()
        );
        debug!(%url, %metric_type, "Fetching highscore");
        let body = get_text(&self.http, &url).await?;
        let snapshot = parse_highscore(&body)?;
        debug!(%metric_type, entries = snapshot.entries.len(), timestamp = %snapshot.timestamp, "Highscore parsed");
        Ok(snapshot)
    }

    pub async fn fetch_players(&self) -> Result<PlayersSnapshot> {
        let url = self.endpoint("players.xml");
        debug!(%url, "Fetching players");
        let body = get_text(&self.http, &url).await?;
        parse_players_xml(&body)
    }
}
