use super::entity::{
    job_state,
    prelude,
};
use crate::error::{
    Error,
    Result,
};
use chrono::{
    DateTime,
    NaiveDate,
    Utc,
};
use sea_orm::{
    sea_query::OnConflict,
    ActiveValue,
    ConnectionTrait,
    EntityTrait,
};
use serde::{
    de::DeserializeOwned,
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

pub const RECAP_JOB: &str = "recap";
pub const RENDER_JOB: &str = "render";

fn players_job(server_id: &str) -> String {
    format!("players:{server_id}")
}

/// Local date of the last recap that was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecapState {
    pub last_date: NaiveDate,
}

/// The last report written by `render` or `post-recap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderState {
    pub last_report_path: PathBuf,
    pub last_report_name: String,
    pub date: NaiveDate,
}

/// Last `players.xml` fetch of one server, recorded even when the listing was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayersState {
    pub fetched_at: DateTime<Utc>,
    pub players: usize,
}

pub struct JobStateRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> JobStateRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// The stored value of `job_key`. An unreadable value counts as missing.
    pub async fn get<T: DeserializeOwned>(&self, job_key: &str) -> Result<Option<T>> {
        let Some(row) = prelude::JobState::find_by_id(job_key.to_string()).one(self.db).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&row.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(job_key, error = %e, "Ignoring unreadable job state");
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, job_key: &str, value: &T, updated_at: DateTime<Utc>) -> Result<()> {
        let value = serde_json::to_string(value).map_err(|e| Error::StoreWriteFailed(e.to_string()))?;
        let row = job_state::ActiveModel {
            job_key: ActiveValue::Set(job_key.to_string()),
            value: ActiveValue::Set(value),
            updated_at: ActiveValue::Set(updated_at.timestamp()),
        };
        prelude::JobState::insert(row)
            .on_conflict(
                OnConflict::column(job_state::Column::JobKey)
                    .update_columns([job_state::Column::Value, job_state::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await?;
        debug!(job_key, "Job state saved");
        Ok(())
    }

    pub async fn last_recap(&self) -> Result<Option<NaiveDate>> {
        Ok(self.get::<RecapState>(RECAP_JOB).await?.map(|s| s.last_date))
    }

    pub async fn set_last_recap(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<()> {
        self.set(RECAP_JOB, &RecapState { last_date: date }, now).await
    }

    pub async fn last_render(&self) -> Result<Option<RenderState>> {
        self.get(RENDER_JOB).await
    }

    pub async fn set_last_render(&self, state: &RenderState, now: DateTime<Utc>) -> Result<()> {
        self.set(RENDER_JOB, state, now).await
    }

    pub async fn players_fetched(&self, server_id: &str) -> Result<Option<PlayersState>> {
        self.get(&players_job(server_id)).await
    }

    pub async fn set_players_fetched(&self, server_id: &str, state: &PlayersState) -> Result<()> {
        self.set(&players_job(server_id), state, state.fetched_at).await
    }
}
