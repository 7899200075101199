use sea_orm::entity::prelude::*;

/// Sent alerts. The latest row of a category drives its cooldown.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "alert")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub server_id: String,
    pub player_id: i64,
    /// `TOP:global`, `SPIKE:military_lost`, ...
    pub category: String,
    pub created_at: i64,
    /// API timestamp of the snapshot that triggered the alert.
    pub api_timestamp: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
