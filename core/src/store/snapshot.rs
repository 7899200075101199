use super::entity::{
    prelude,
    snapshot,
};
use crate::{
    error::{
        Error,
        Result,
    },
    metrics::{
        MetricPayload,
        MetricType,
        Snapshot,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use futures::future::BoxFuture;
use sea_orm::{
    sea_query::OnConflict,
    ActiveValue,
    ColumnTrait,
    ConnectionTrait,
    EntityTrait,
    QueryFilter,
    QueryOrder,
};

/// Read and insert-if-absent access to the snapshot history. There is no update or delete.
///
/// Readers (reports, the CLI) depend on this trait only.
pub trait SnapshotStore: Send + Sync {
    /// Inserts `snapshot` unless its identity key is already stored. Returns whether a row was
    /// written. Atomic per key: concurrent calls with one key write at most one row.
    fn insert_if_absent<'a>(&'a self, snapshot: &'a Snapshot) -> BoxFuture<'a, Result<bool>>;

    /// Snapshots with `from <= timestamp <= to`, oldest first.
    fn query_range<'a>(
        &'a self,
        server_id: &'a str,
        player_id: i64,
        metric_type: MetricType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Vec<Snapshot>>>;

    fn latest<'a>(
        &'a self,
        server_id: &'a str,
        player_id: i64,
        metric_type: MetricType,
    ) -> BoxFuture<'a, Result<Option<Snapshot>>>;
}

pub struct SnapshotRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> SnapshotRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// `ON CONFLICT DO NOTHING` against the identity index: a duplicate affects zero rows.
    pub async fn insert_if_absent(&self, snapshot: &Snapshot) -> Result<bool> {
        let payload = serde_json::to_string(&snapshot.payload).map_err(|e| Error::StoreWriteFailed(e.to_string()))?;
        let key = snapshot.key();
        let row = snapshot::ActiveModel {
            server_id: ActiveValue::Set(key.server_id),
            player_id: ActiveValue::Set(key.player_id),
            metric_type: ActiveValue::Set(key.metric_type.as_str().to_string()),
            timestamp: ActiveValue::Set(key.timestamp),
            payload: ActiveValue::Set(payload),
            collected_at: ActiveValue::Set(snapshot.collected_at.timestamp()),
            ..Default::default()
        };

        let rows = prelude::Snapshot::insert(row)
            .on_conflict(
                OnConflict::columns([
                    snapshot::Column::ServerId,
                    snapshot::Column::PlayerId,
                    snapshot::Column::MetricType,
                    snapshot::Column::Timestamp,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db)
            .await?;

        Ok(rows > 0)
    }

    pub async fn query_range(
        &self,
        server_id: &str,
        player_id: i64,
        metric_type: MetricType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        prelude::Snapshot::find()
            .filter(snapshot::Column::ServerId.eq(server_id))
            .filter(snapshot::Column::PlayerId.eq(player_id))
            .filter(snapshot::Column::MetricType.eq(metric_type.as_str()))
            .filter(snapshot::Column::Timestamp.between(from.timestamp(), to.timestamp()))
            .order_by_asc(snapshot::Column::Timestamp)
            .all(self.db)
            .await?
            .into_iter()
            .map(Snapshot::try_from)
            .collect()
    }

    pub async fn latest(&self, server_id: &str, player_id: i64, metric_type: MetricType) -> Result<Option<Snapshot>> {
        prelude::Snapshot::find()
            .filter(snapshot::Column::ServerId.eq(server_id))
            .filter(snapshot::Column::PlayerId.eq(player_id))
            .filter(snapshot::Column::MetricType.eq(metric_type.as_str()))
            .order_by_desc(snapshot::Column::Timestamp)
            .one(self.db)
            .await?
            .map(Snapshot::try_from)
            .transpose()
    }
}

impl TryFrom<snapshot::Model> for Snapshot {
    type Error = Error;

    fn try_from(row: snapshot::Model) -> Result<Self> {
        let corrupt = |what: &str| Error::CorruptRow(format!("snapshot {}: {what}", row.id));

        let metric_type: MetricType = row
            .metric_type
            .parse()
            .map_err(|_| corrupt(&format!("unknown metric type {:?}", row.metric_type)))?;
        let payload: MetricPayload =
            serde_json::from_str(&row.payload).map_err(|e| corrupt(&format!("payload: {e}")))?;
        if payload.metric_type() != metric_type {
            return Err(corrupt(&format!("{} payload stored as {metric_type}", payload.metric_type())));
        }
        let timestamp = DateTime::from_timestamp(row.timestamp, 0).ok_or_else(|| corrupt("timestamp out of range"))?;
        let collected_at =
            DateTime::from_timestamp(row.collected_at, 0).ok_or_else(|| corrupt("collected_at out of range"))?;

        Ok(Snapshot {
            server_id: row.server_id,
            player_id: row.player_id,
            timestamp,
            payload,
            collected_at,
        })
    }
}
