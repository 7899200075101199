//! # Snapshot store
//!
//! SQLite through sea-orm:
//!
//! - `snapshot`: the history
//! - `player`: cached listing used to resolve names
//! - `universe`: last known directory entry
//! - `alert`: sent alerts, for cooldowns and the report
//! - `job_state`: what the scheduled jobs last did, so a restart does not repeat them
//!
//! The schema is created on open; all statements are idempotent.

mod alert;
pub mod entity;
mod job_state;
mod player;
mod snapshot;
mod universe;

use crate::{
    error::Result,
    metrics::{
        MetricType,
        Snapshot,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use futures::future::BoxFuture;
pub use alert::{
    AlertRecord,
    AlertRepository,
};
pub use job_state::{
    JobStateRepository,
    PlayersState,
    RecapState,
    RenderState,
    RECAP_JOB,
    RENDER_JOB,
};
pub use player::{
    name_key,
    PlayerRepository,
    SUGGESTION_CUTOFF,
};
use sea_orm::{
    sea_query::Index,
    ConnectOptions,
    ConnectionTrait,
    Database,
    DatabaseConnection,
    EntityTrait,
    PaginatorTrait,
    Schema,
};
pub use snapshot::{
    SnapshotRepository,
    SnapshotStore,
};
use std::path::Path;
pub use universe::UniverseRepository;

/// Creates missing tables and the snapshot identity index.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut tables = vec![
        schema.create_table_from_entity(entity::prelude::Snapshot),
        schema.create_table_from_entity(entity::prelude::Player),
        schema.create_table_from_entity(entity::prelude::Universe),
        schema.create_table_from_entity(entity::prelude::Alert),
        schema.create_table_from_entity(entity::prelude::JobState),
    ];
    for table in tables.iter_mut() {
        table.if_not_exists();
        db.execute(backend.build(&*table)).await?;
    }

    let identity = Index::create()
        .name("idx_snapshot_identity")
        .table(entity::prelude::Snapshot)
        .col(entity::snapshot::Column::ServerId)
        .col(entity::snapshot::Column::PlayerId)
        .col(entity::snapshot::Column::MetricType)
        .col(entity::snapshot::Column::Timestamp)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&identity)).await?;

    let alert_category = Index::create()
        .name("idx_alert_category")
        .table(entity::prelude::Alert)
        .col(entity::alert::Column::ServerId)
        .col(entity::alert::Column::PlayerId)
        .col(entity::alert::Column::Category)
        .col(entity::alert::Column::CreatedAt)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&alert_category)).await?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    /// Opens (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::connect(&format!("sqlite://{}?mode=rwc", path.display())).await
    }

    /// Private in-memory database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let mut options = ConnectOptions::new(url.to_string());
        // One connection: an in-memory database is per connection, and SQLite serializes writers anyway.
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await?;
        ensure_schema(&db).await?;
        debug!(url, "Store ready");
        Ok(Self { db })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn snapshots(&self) -> SnapshotRepository<'_, DatabaseConnection> {
        SnapshotRepository::new(&self.db)
    }

    pub fn players(&self) -> PlayerRepository<'_> {
        PlayerRepository::new(&self.db)
    }

    pub fn universes(&self) -> UniverseRepository<'_> {
        UniverseRepository::new(&self.db)
    }

    pub fn alerts(&self) -> AlertRepository<'_> {
        AlertRepository::new(&self.db)
    }

    pub fn jobs(&self) -> JobStateRepository<'_, DatabaseConnection> {
        JobStateRepository::new(&self.db)
    }

    pub async fn count_snapshots(&self) -> Result<u64> {
        Ok(entity::prelude::Snapshot::find().count(&self.db).await?)
    }
}

impl SnapshotStore for Store {
    fn insert_if_absent<'a>(&'a self, snapshot: &'a Snapshot) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { self.snapshots().insert_if_absent(snapshot).await })
    }

    fn query_range<'a>(
        &'a self,
        server_id: &'a str,
        player_id: i64,
        metric_type: MetricType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Vec<Snapshot>>> {
        Box::pin(async move {
            self.snapshots()
                .query_range(server_id, player_id, metric_type, from, to)
                .await
        })
    }

    fn latest<'a>(
        &'a self,
        server_id: &'a str,
        player_id: i64,
        metric_type: MetricType,
    ) -> BoxFuture<'a, Result<Option<Snapshot>>> {
        Box::pin(async move { self.snapshots().latest(server_id, player_id, metric_type).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::PlayerEntry,
        directory::Universe,
        metrics::{
            MetricPayload,
            Ranking,
        },
    };
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn snapshot(metric_type: MetricType, hour: u32, points: i64) -> Snapshot {
        Snapshot {
            server_id: "s256-fr".to_string(),
            player_id: 100,
            timestamp: at(hour),
            payload: MetricPayload::from_entry(
                metric_type,
                &crate::api::HighscoreEntry {
                    player_id: 100,
                    rank: 3,
                    points,
                    ships: None,
                },
            ),
            collected_at: at(23),
        }
    }

    fn player(id: i64, name: &str) -> PlayerEntry {
        PlayerEntry {
            player_id: id,
            name: name.to_string(),
            status: None,
            alliance_id: None,
        }
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_the_first_payload() {
        let store = Store::in_memory().await.unwrap();
        let first = snapshot(MetricType::Global, 10, 1_000);
        let mut second = first.clone();
        second.payload = MetricPayload::Global(Ranking { points: 2_000, rank: 1 });

        assert!(store.insert_if_absent(&first).await.unwrap());
        assert!(!store.insert_if_absent(&second).await.unwrap());
        assert!(!store.insert_if_absent(&first).await.unwrap());

        assert_eq!(store.count_snapshots().await.unwrap(), 1);
        let latest = store.latest("s256-fr", 100, MetricType::Global).await.unwrap().unwrap();
        assert_eq!(latest.points(), 1_000);
    }

    #[tokio::test]
    async fn identity_includes_metric_type_and_player() {
        let store = Store::in_memory().await.unwrap();
        let global = snapshot(MetricType::Global, 10, 1);
        let honor = snapshot(MetricType::Honor, 10, 1);
        let mut other_player = global.clone();
        other_player.player_id = 101;

        for s in [&global, &honor, &other_player] {
            assert!(store.insert_if_absent(s).await.unwrap());
        }
        assert_eq!(store.count_snapshots().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn query_range_is_ascending_and_inclusive() {
        let store = Store::in_memory().await.unwrap();
        for hour in [14, 9, 12, 10, 11] {
            store.insert_if_absent(&snapshot(MetricType::Economy, hour, hour as i64)).await.unwrap();
        }
        store.insert_if_absent(&snapshot(MetricType::Research, 11, 0)).await.unwrap();

        let range = store
            .query_range("s256-fr", 100, MetricType::Economy, at(10), at(12))
            .await
            .unwrap();
        let hours: Vec<i64> = range.iter().map(Snapshot::points).collect();
        assert_eq!(hours, vec![10, 11, 12]);

        let latest = store.latest("s256-fr", 100, MetricType::Economy).await.unwrap().unwrap();
        assert_eq!(latest.timestamp, at(14));
        assert!(store.latest("s256-fr", 100, MetricType::Honor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_inserts_of_one_key_write_one_row() {
        let store = Store::in_memory().await.unwrap();
        let candidate = snapshot(MetricType::Military, 8, 5);

        let results = futures::future::join_all((0..8).map(|_| store.insert_if_absent(&candidate))).await;
        let inserted = results.into_iter().map(Result::unwrap).filter(|inserted| *inserted).count();
        assert_eq!(inserted, 1);
        assert_eq!(store.count_snapshots().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("nested").join("stats.sqlite");

        let store = Store::open(&path).await.unwrap();
        store.insert_if_absent(&snapshot(MetricType::Global, 1, 1)).await.unwrap();
        drop(store);

        let store = Store::open(&path).await.unwrap();
        assert!(!store.insert_if_absent(&snapshot(MetricType::Global, 1, 1)).await.unwrap());
        assert_eq!(store.count_snapshots().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn player_cache_replaces_and_matches_case_insensitively() {
        let store = Store::in_memory().await.unwrap();
        let players = store.players();

        players
            .replace_all("s256-fr", &[player(1, "Galoup"), player(2, "Galopin")], at(1))
            .await
            .unwrap();
        assert_eq!(players.find_by_name("s256-fr", " galoup ").await.unwrap().unwrap().player_id, 1);
        assert_eq!(players.fetched_at("s256-fr").await.unwrap(), Some(at(1)));

        players.replace_all("s256-fr", &[player(3, "Vador")], at(2)).await.unwrap();
        assert!(players.find_by_name("s256-fr", "Galoup").await.unwrap().is_none());
        assert!(players.find_by_name("s1-de", "Vador").await.unwrap().is_none());

        // An empty listing keeps the cached players but still counts as a fetch.
        assert_eq!(players.replace_all("s256-fr", &[], at(3)).await.unwrap(), 0);
        assert_eq!(players.fetched_at("s256-fr").await.unwrap(), Some(at(3)));
        assert!(players.find_by_name("s256-fr", "Vador").await.unwrap().is_some());

        assert_eq!(players.replace_all("s1-de", &[], at(4)).await.unwrap(), 0);
        assert_eq!(players.fetched_at("s1-de").await.unwrap(), Some(at(4)));
    }

    #[tokio::test]
    async fn player_suggestions_are_close_matches() {
        let store = Store::in_memory().await.unwrap();
        let players = store.players();
        players
            .replace_all(
                "s256-fr",
                &[player(1, "Galoup"), player(2, "Galopin"), player(3, "g_lo")],
                at(1),
            )
            .await
            .unwrap();

        assert_eq!(
            players.suggestions("s256-fr", "GALUOP", 5).await.unwrap(),
            vec!["Galoup".to_string()]
        );
        assert_eq!(players.suggestions("s256-fr", "g_l", 5).await.unwrap(), vec!["g_lo".to_string()]);
        assert!(players.suggestions("s256-fr", "zz", 5).await.unwrap().is_empty());
        assert!(players.suggestions("s1-de", "Galoup", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_timestamps_are_the_normalized_ones() {
        let store = Store::in_memory().await.unwrap();
        let normalizer = crate::normalizer::Normalizer::new(chrono_tz::UTC);
        let mut candidate = snapshot(MetricType::Global, 10, 1);
        candidate.timestamp = normalizer
            .resolve(&crate::metrics::SourceTimestamp::Local("2024-05-01T10:00:00.700Z".to_string()))
            .unwrap();

        assert!(store.insert_if_absent(&candidate).await.unwrap());
        let stored = store.latest("s256-fr", 100, MetricType::Global).await.unwrap().unwrap();
        assert_eq!(stored, candidate);
    }

    #[tokio::test]
    async fn job_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("stats.sqlite");
        let may_2 = chrono::NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        let store = Store::open(&path).await.unwrap();
        assert_eq!(store.jobs().last_recap().await.unwrap(), None);
        store.jobs().set_last_recap(may_2 - chrono::Days::new(1), at(1)).await.unwrap();
        store.jobs().set_last_recap(may_2, at(2)).await.unwrap();
        let render = RenderState {
            last_report_path: dir.child("out").join("report.html"),
            last_report_name: "report.html".to_string(),
            date: may_2,
        };
        store.jobs().set_last_render(&render, at(2)).await.unwrap();
        drop(store);

        let store = Store::open(&path).await.unwrap();
        assert_eq!(store.jobs().last_recap().await.unwrap(), Some(may_2));
        assert_eq!(store.jobs().last_render().await.unwrap(), Some(render));
        // A value of another shape reads as missing.
        store.jobs().set(RECAP_JOB, &"garbage", at(3)).await.unwrap();
        assert_eq!(store.jobs().last_recap().await.unwrap(), None);
    }

    #[tokio::test]
    async fn alerts_are_listed_newest_first() {
        let store = Store::in_memory().await.unwrap();
        let alerts = store.alerts();
        let record = |category: &str, hour: u32| AlertRecord {
            category: category.to_string(),
            created_at: at(hour),
            api_timestamp: at(hour),
        };
        alerts.log("s256-fr", 100, &record("TOP:global", 8)).await.unwrap();
        alerts.log("s256-fr", 100, &record("TOP:global", 10)).await.unwrap();
        alerts.log("s256-fr", 100, &record("SPIKE:military_lost", 9)).await.unwrap();
        alerts.log("s256-fr", 101, &record("TOP:global", 11)).await.unwrap();

        assert_eq!(alerts.last_sent("s256-fr", 100, "TOP:global").await.unwrap(), Some(at(10)));
        assert_eq!(alerts.last_sent("s256-fr", 100, "FLOP:global").await.unwrap(), None);

        let listed = alerts.since("s256-fr", 100, at(9), 10).await.unwrap();
        assert_eq!(listed, vec![record("TOP:global", 10), record("SPIKE:military_lost", 9)]);
        assert_eq!(alerts.since("s256-fr", 100, at(0), 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn universe_upsert_refreshes_the_name() {
        let store = Store::in_memory().await.unwrap();
        let mut universe = Universe {
            server_id: "s256-fr".to_string(),
            community: "fr".to_string(),
            name: "Fornax".to_string(),
            language: "fr".to_string(),
            base_url: url::Url::parse("https://s256-fr.ogame.gameforge.com").unwrap(),
        };
        store.universes().upsert(&universe, at(1)).await.unwrap();
        universe.name = "Fornax II".to_string();
        store.universes().upsert(&universe, at(2)).await.unwrap();

        assert_eq!(store.universes().get("s256-fr").await.unwrap(), Some(universe));
        assert!(store.universes().get("s1-fr").await.unwrap().is_none());
    }
}
