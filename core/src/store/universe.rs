use super::entity::{
    prelude,
    universe,
};
use crate::{
    directory::Universe,
    error::{
        Error,
        Result,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use sea_orm::{
    sea_query::OnConflict,
    ActiveValue,
    DatabaseConnection,
    EntityTrait,
};
use url::Url;

pub struct UniverseRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> UniverseRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records the latest resolution of a universe; the lobby may rename it over time.
    pub async fn upsert(&self, universe: &Universe, updated_at: DateTime<Utc>) -> Result<()> {
        let row = universe::ActiveModel {
            server_id: ActiveValue::Set(universe.server_id.clone()),
            community: ActiveValue::Set(universe.community.clone()),
            name: ActiveValue::Set(universe.name.clone()),
            language: ActiveValue::Set(universe.language.clone()),
            base_url: ActiveValue::Set(universe.base_url.to_string()),
            updated_at: ActiveValue::Set(updated_at.timestamp()),
        };

        prelude::Universe::insert(row)
            .on_conflict(
                OnConflict::column(universe::Column::ServerId)
                    .update_columns([
                        universe::Column::Community,
                        universe::Column::Name,
                        universe::Column::Language,
                        universe::Column::BaseUrl,
                        universe::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await?;
        Ok(())
    }

    pub async fn get(&self, server_id: &str) -> Result<Option<Universe>> {
        prelude::Universe::find_by_id(server_id.to_string())
            .one(self.db)
            .await?
            .map(Universe::try_from)
            .transpose()
    }
}

impl TryFrom<universe::Model> for Universe {
    type Error = Error;

    fn try_from(row: universe::Model) -> Result<Self> {
        let base_url = Url::parse(&row.base_url)
            .map_err(|e| Error::CorruptRow(format!("universe {}: base_url: {e}", row.server_id)))?;
        Ok(Universe {
            server_id: row.server_id,
            community: row.community,
            name: row.name,
            language: row.language,
            base_url,
        })
    }
}
