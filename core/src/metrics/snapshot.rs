use super::MetricType;
use crate::api::HighscoreEntry;
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub points: i64,
    pub rank: u32,
}

/// The military category also reports the fleet size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilitaryRanking {
    pub points: i64,
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ships: Option<u64>,
}

/// Metric data of one snapshot, discriminated by its [`MetricType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricPayload {
    Global(Ranking),
    Economy(Ranking),
    Research(Ranking),
    Military(MilitaryRanking),
    MilitaryLost(Ranking),
    MilitaryBuilt(Ranking),
    MilitaryDestroyed(Ranking),
    Honor(Ranking),
}

impl MetricPayload {
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricPayload::Global(_) => MetricType::Global,
            MetricPayload::Economy(_) => MetricType::Economy,
            MetricPayload::Research(_) => MetricType::Research,
            MetricPayload::Military(_) => MetricType::Military,
            MetricPayload::MilitaryLost(_) => MetricType::MilitaryLost,
            MetricPayload::MilitaryBuilt(_) => MetricType::MilitaryBuilt,
            MetricPayload::MilitaryDestroyed(_) => MetricType::MilitaryDestroyed,
            MetricPayload::Honor(_) => MetricType::Honor,
        }
    }

    /// Points and rank, shared by every category.
    pub fn ranking(&self) -> Ranking {
        match *self {
            MetricPayload::Military(m) => Ranking {
                points: m.points,
                rank: m.rank,
            },
            MetricPayload::Global(r)
            | MetricPayload::Economy(r)
            | MetricPayload::Research(r)
            | MetricPayload::MilitaryLost(r)
            | MetricPayload::MilitaryBuilt(r)
            | MetricPayload::MilitaryDestroyed(r)
            | MetricPayload::Honor(r) => r,
        }
    }

    pub fn ships(&self) -> Option<u64> {
        match self {
            MetricPayload::Military(m) => m.ships,
            _ => None,
        }
    }

    /// Builds the payload variant selected by `metric_type` from a highscore row.
    pub fn from_entry(metric_type: MetricType, entry: &HighscoreEntry) -> Self {
        let ranking = Ranking {
            points: entry.points,
            rank: entry.rank,
        };
        match metric_type {
            MetricType::Global => MetricPayload::Global(ranking),
            MetricType::Economy => MetricPayload::Economy(ranking),
            MetricType::Research => MetricPayload::Research(ranking),
            MetricType::Military => MetricPayload::Military(MilitaryRanking {
                points: entry.points,
                rank: entry.rank,
                ships: entry.ships,
            }),
            MetricType::MilitaryLost => MetricPayload::MilitaryLost(ranking),
            MetricType::MilitaryBuilt => MetricPayload::MilitaryBuilt(ranking),
            MetricType::MilitaryDestroyed => MetricPayload::MilitaryDestroyed(ranking),
            MetricType::Honor => MetricPayload::Honor(ranking),
        }
    }
}

/// `(server_id, player_id, metric_type, timestamp)`: at most one stored snapshot per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey {
    pub server_id: String,
    pub player_id: i64,
    pub metric_type: MetricType,
    pub timestamp: i64,
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}@{}", self.server_id, self.player_id, self.metric_type, self.timestamp)
    }
}

/// One immutable observation of a player's standing in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub server_id: String,
    pub player_id: i64,
    /// Instant reported by the API, never the collection time.
    pub timestamp: DateTime<Utc>,
    pub payload: MetricPayload,
    /// Informational only; not part of the identity key.
    pub collected_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn metric_type(&self) -> MetricType {
        self.payload.metric_type()
    }

    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            server_id: self.server_id.clone(),
            player_id: self.player_id,
            metric_type: self.metric_type(),
            timestamp: self.timestamp.timestamp(),
        }
    }

    pub fn points(&self) -> i64 {
        self.payload.ranking().points
    }

    pub fn rank(&self) -> u32 {
        self.payload.ranking().rank
    }
}

/// Timestamp as found in a response, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTimestamp {
    /// Seconds since the Unix epoch.
    Epoch(i64),
    /// Wall-clock time in the server's timezone, e.g. `2024-05-01T10:00:00`.
    Local(String),
    Missing,
}

impl SourceTimestamp {
    /// Classifies a raw root attribute: digits are epoch seconds, anything else is local time.
    pub fn from_attribute(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => SourceTimestamp::Missing,
            Some(value) => match value.parse::<i64>() {
                Ok(epoch) => SourceTimestamp::Epoch(epoch),
                Err(_) => SourceTimestamp::Local(value.to_string()),
            },
        }
    }
}

impl std::fmt::Display for SourceTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTimestamp::Epoch(epoch) => write!(f, "{epoch}"),
            SourceTimestamp::Local(value) => f.write_str(value),
            SourceTimestamp::Missing => f.write_str("<missing>"),
        }
    }
}

/// A single highscore row for the tracked player, as fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    pub server_id: String,
    pub player_id: i64,
    pub metric_type: MetricType,
    pub source_timestamp: SourceTimestamp,
    pub entry: HighscoreEntry,
    pub collected_at: DateTime<Utc>,
}
