//! Player name resolution against the cached `players.xml` listing.

use crate::{
    api::{
        OGameApiClient,
        PlayerEntry,
    },
    error::{
        Error,
        Result,
    },
    store::Store,
};
use chrono::{
    DateTime,
    Duration,
    Utc,
};

/// The public API regenerates `players.xml` once a day.
pub const PLAYERS_MAX_AGE_HOURS: i64 = 20;

const SUGGESTIONS: usize = 5;

pub struct PlayerResolver<'a> {
    store: &'a Store,
    api: &'a OGameApiClient,
    server_id: &'a str,
}

impl<'a> PlayerResolver<'a> {
    pub fn new(store: &'a Store, api: &'a OGameApiClient, server_id: &'a str) -> Self {
        Self { store, api, server_id }
    }

    /// Refreshes the cached listing when it is missing, older than [`PLAYERS_MAX_AGE_HOURS`] or
    /// `force` is set. Returns the number of players written (0 when the cache was fresh).
    pub async fn refresh(&self, now: DateTime<Utc>, force: bool) -> Result<usize> {
        let fetched_at = self.store.players().fetched_at(self.server_id).await?;
        let fresh = fetched_at.is_some_and(|at| now - at < Duration::hours(PLAYERS_MAX_AGE_HOURS));
        if fresh && !force {
            debug!(server_id = self.server_id, ?fetched_at, "Players cache is fresh");
            return Ok(0);
        }

        let listing = self.api.fetch_players().await?;
        let written = self
            .store
            .players()
            .replace_all(self.server_id, &listing.players, now)
            .await?;
        info!(server_id = self.server_id, players = written, api_timestamp = %listing.timestamp, "Players cache refreshed");
        Ok(written)
    }

    /// Finds `name` (case-insensitively). A miss forces one refresh before giving up with
    /// [`Error::PlayerNotFound`] and close matches.
    pub async fn resolve(&self, name: &str, now: DateTime<Utc>) -> Result<PlayerEntry> {
        self.refresh(now, false).await?;
        if let Some(player) = self.store.players().find_by_name(self.server_id, name).await? {
            return Ok(player);
        }

        debug!(name, "Player not in cache, refreshing");
        self.refresh(now, true).await?;
        if let Some(player) = self.store.players().find_by_name(self.server_id, name).await? {
            return Ok(player);
        }

        let suggestions = self.store.players().suggestions(self.server_id, name, SUGGESTIONS).await?;
        Err(Error::PlayerNotFound {
            name: name.to_string(),
            suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use url::Url;

    const PLAYERS: &str = r#"<players timestamp="1700000000">
  <player id="100" name="Galoup"/>
  <player id="101" name="Galopin"/>
</players>"#;

    async fn setup(server: &mut mockito::ServerGuard, hits: usize) -> (Store, OGameApiClient, mockito::Mock) {
        let mock = server
            .mock("GET", "/api/players.xml")
            .with_body(PLAYERS)
            .expect(hits)
            .create_async()
            .await;
        let api = OGameApiClient::new(Url::parse(&server.url()).unwrap(), reqwest::Client::new());
        (Store::in_memory().await.unwrap(), api, mock)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn fresh_cache_is_reused() {
        let mut server = mockito::Server::new_async().await;
        let (store, api, mock) = setup(&mut server, 1).await;
        let resolver = PlayerResolver::new(&store, &api, "s256-fr");

        assert_eq!(resolver.resolve("galoup", now()).await.unwrap().player_id, 100);
        assert_eq!(resolver.resolve("GALOPIN", now() + Duration::hours(19)).await.unwrap().player_id, 101);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stale_cache_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let (store, api, mock) = setup(&mut server, 2).await;
        let resolver = PlayerResolver::new(&store, &api, "s256-fr");

        resolver.resolve("Galoup", now()).await.unwrap();
        resolver.resolve("Galoup", now() + Duration::hours(21)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn miss_refreshes_once_then_suggests() {
        let mut server = mockito::Server::new_async().await;
        let (store, api, mock) = setup(&mut server, 2).await;
        let resolver = PlayerResolver::new(&store, &api, "s256-fr");

        match resolver.resolve("galo", now()).await {
            Err(Error::PlayerNotFound { name, suggestions }) => {
                assert_eq!(name, "galo");
                assert_eq!(suggestions, vec!["Galoup".to_string()]);
            }
            other => panic!("expected PlayerNotFound, got {other:?}"),
        }
        mock.assert_async().await;
    }
}
