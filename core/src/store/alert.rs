use super::entity::{
    alert,
    prelude,
};
use crate::error::{
    Error,
    Result,
};
use chrono::{
    DateTime,
    Utc,
};
use sea_orm::{
    ActiveValue,
    ColumnTrait,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    QuerySelect,
};
use serde::Serialize;

/// One sent alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertRecord {
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub api_timestamp: DateTime<Utc>,
}

pub struct AlertRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> AlertRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn log(&self, server_id: &str, player_id: i64, record: &AlertRecord) -> Result<()> {
        let row = alert::ActiveModel {
            server_id: ActiveValue::Set(server_id.to_string()),
            player_id: ActiveValue::Set(player_id),
            category: ActiveValue::Set(record.category.clone()),
            created_at: ActiveValue::Set(record.created_at.timestamp()),
            api_timestamp: ActiveValue::Set(record.api_timestamp.timestamp()),
            ..Default::default()
        };
        prelude::Alert::insert(row).exec_without_returning(self.db).await?;
        Ok(())
    }

    /// When an alert of `category` was last sent for this player.
    pub async fn last_sent(&self, server_id: &str, player_id: i64, category: &str) -> Result<Option<DateTime<Utc>>> {
        let row = prelude::Alert::find()
            .filter(alert::Column::ServerId.eq(server_id))
            .filter(alert::Column::PlayerId.eq(player_id))
            .filter(alert::Column::Category.eq(category))
            .order_by_desc(alert::Column::CreatedAt)
            .one(self.db)
            .await?;
        Ok(row.and_then(|r| DateTime::from_timestamp(r.created_at, 0)))
    }

    /// Up to `limit` alerts sent at or after `since`, newest first.
    pub async fn since(&self, server_id: &str, player_id: i64, since: DateTime<Utc>, limit: u64) -> Result<Vec<AlertRecord>> {
        prelude::Alert::find()
            .filter(alert::Column::ServerId.eq(server_id))
            .filter(alert::Column::PlayerId.eq(player_id))
            .filter(alert::Column::CreatedAt.gte(since.timestamp()))
            .order_by_desc(alert::Column::CreatedAt)
            .order_by_desc(alert::Column::Id)
            .limit(limit)
            .all(self.db)
            .await?
            .into_iter()
            .map(AlertRecord::try_from)
            .collect()
    }
}

impl TryFrom<alert::Model> for AlertRecord {
    type Error = Error;

    fn try_from(row: alert::Model) -> Result<Self> {
        let instant = |raw: i64, what: &str| {
            DateTime::from_timestamp(raw, 0).ok_or_else(|| Error::CorruptRow(format!("alert {}: {what} out of range", row.id)))
        };
        Ok(AlertRecord {
            created_at: instant(row.created_at, "created_at")?,
            api_timestamp: instant(row.api_timestamp, "api_timestamp")?,
            category: row.category,
        })
    }
}
