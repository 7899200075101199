use sea_orm::entity::prelude::*;

/// Append-only history. `(server_id, player_id, metric_type, timestamp)` carries a unique index,
/// created alongside the table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "snapshot")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub server_id: String,
    pub player_id: i64,
    pub metric_type: String,
    /// Seconds since the Unix epoch, UTC.
    pub timestamp: i64,
    /// `MetricPayload` as JSON.
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub collected_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
