use sea_orm::entity::prelude::*;

/// Cached `players.xml` listing, one generation per server.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "player")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub server_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub player_id: i64,
    pub name: String,
    /// Lower-cased, trimmed name used for lookups.
    pub name_key: String,
    pub status: Option<String>,
    pub alliance_id: Option<i64>,
    pub fetched_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
