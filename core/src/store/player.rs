use super::{
    entity::{
        player,
        prelude,
    },
    job_state::{
        JobStateRepository,
        PlayersState,
    },
};
use crate::{
    api::PlayerEntry,
    error::Result,
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
    TransactionTrait,
};
use std::cmp::Ordering;

/// Rows per `INSERT`, well below SQLite's bound-parameter limit.
const INSERT_CHUNK: usize = 500;

/// Minimum normalized Levenshtein similarity for a name to be suggested.
pub const SUGGESTION_CUTOFF: f64 = 0.6;

/// Key used for name lookups.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub struct PlayerRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> PlayerRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Replaces the cached listing of `server_id` in one transaction.
    ///
    /// An empty listing leaves the cached players untouched and returns 0, but the fetch is still
    /// recorded so the cache does not look stale.
    pub async fn replace_all(&self, server_id: &str, players: &[PlayerEntry], fetched_at: DateTime<Utc>) -> Result<usize> {
        let state = PlayersState {
            fetched_at,
            players: players.len(),
        };
        if players.is_empty() {
            warn!(server_id, "Empty player listing, keeping the cached one");
            JobStateRepository::new(self.db).set_players_fetched(server_id, &state).await?;
            return Ok(0);
        }

        let txn = self.db.begin().await?;
        prelude::Player::delete_many()
            .filter(player::Column::ServerId.eq(server_id))
            .exec(&txn)
            .await?;

        for chunk in players.chunks(INSERT_CHUNK) {
            let rows = chunk.iter().map(|p| player::ActiveModel {
                server_id: ActiveValue::Set(server_id.to_string()),
                player_id: ActiveValue::Set(p.player_id),
                name: ActiveValue::Set(p.name.clone()),
                name_key: ActiveValue::Set(name_key(&p.name)),
                status: ActiveValue::Set(p.status.clone()),
                alliance_id: ActiveValue::Set(p.alliance_id),
                fetched_at: ActiveValue::Set(fetched_at.timestamp()),
            });
            prelude::Player::insert_many(rows).exec_without_returning(&txn).await?;
        }
        JobStateRepository::new(&txn).set_players_fetched(server_id, &state).await?;
        txn.commit().await?;

        Ok(players.len())
    }

    /// Case-insensitive lookup by name.
    pub async fn find_by_name(&self, server_id: &str, name: &str) -> Result<Option<PlayerEntry>> {
        let row = prelude::Player::find()
            .filter(player::Column::ServerId.eq(server_id))
            .filter(player::Column::NameKey.eq(name_key(name)))
            .order_by_asc(player::Column::PlayerId)
            .one(self.db)
            .await?;
        Ok(row.map(PlayerEntry::from))
    }

    /// When the listing of `server_id` was last fetched, if ever.
    pub async fn fetched_at(&self, server_id: &str) -> Result<Option<DateTime<Utc>>> {
        if let Some(state) = JobStateRepository::new(self.db).players_fetched(server_id).await? {
            return Ok(Some(state.fetched_at));
        }
        let row = prelude::Player::find()
            .filter(player::Column::ServerId.eq(server_id))
            .order_by_desc(player::Column::FetchedAt)
            .one(self.db)
            .await?;
        Ok(row.and_then(|r| DateTime::from_timestamp(r.fetched_at, 0)))
    }

    /// Up to `limit` cached names close to `query`, most similar first.
    ///
    /// Similarity is the normalized Levenshtein distance of the lookup keys; names below
    /// [`SUGGESTION_CUTOFF`] are left out.
    pub async fn suggestions(&self, server_id: &str, query: &str, limit: usize) -> Result<Vec<String>> {
        let key = name_key(query);
        if key.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<(String, String)> = prelude::Player::find()
            .select_only()
            .column(player::Column::Name)
            .column(player::Column::NameKey)
            .filter(player::Column::ServerId.eq(server_id))
            .into_tuple()
            .all(self.db)
            .await?;
        Ok(closest_names(&key, names, limit))
    }
}

/// Names whose key scores at least [`SUGGESTION_CUTOFF`] against `key`, best first, then by name.
fn closest_names(key: &str, names: Vec<(String, String)>, limit: usize) -> Vec<String> {
    let mut scored: Vec<(f64, String)> = names
        .into_iter()
        .map(|(name, candidate)| (strsim::normalized_levenshtein(key, &candidate), name))
        .filter(|(score, _)| *score >= SUGGESTION_CUTOFF)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().take(limit).map(|(_, name)| name).collect()
}

impl From<player::Model> for PlayerEntry {
    fn from(row: player::Model) -> Self {
        Self {
            player_id: row.player_id,
            name: row.name,
            status: row.status,
            alliance_id: row.alliance_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(raw: &[&str]) -> Vec<(String, String)> {
        raw.iter().map(|n| (n.to_string(), name_key(n))).collect()
    }

    #[test]
    fn typos_are_suggested() {
        assert_eq!(closest_names("galuop", names(&["Galoup", "Vador"]), 5), vec!["Galoup".to_string()]);
    }

    #[test]
    fn wildcard_characters_are_plain_text() {
        assert!(closest_names("g_l", names(&["Galoup"]), 5).is_empty());
        assert!(closest_names("%", names(&["Galoup"]), 5).is_empty());
        assert_eq!(closest_names("dark_lord", names(&["Dark_Lord2", "DarkLord"]), 5), vec![
            "Dark_Lord2".to_string(),
            "DarkLord".to_string()
        ]);
    }

    #[test]
    fn closest_first_and_limited() {
        let cached = names(&["Galopin", "Galoup", "Galopine", "Other"]);
        assert_eq!(closest_names("galopn", cached.clone(), 5), vec![
            "Galopin".to_string(),
            "Galopine".to_string(),
            "Galoup".to_string()
        ]);
        assert_eq!(closest_names("galopn", cached, 1), vec!["Galopin".to_string()]);
    }
}
