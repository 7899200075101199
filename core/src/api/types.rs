use crate::metrics::SourceTimestamp;
use serde::{
    Deserialize,
    Serialize,
};

/// One row of a highscore listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighscoreEntry {
    pub player_id: i64,
    pub rank: u32,
    pub points: i64,
    /// Only reported for the military category.
    pub ships: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighscoreSnapshot {
    /// Root timestamp of the response; the authoritative instant of every entry in it.
    pub timestamp: SourceTimestamp,
    pub total: Option<u64>,
    pub entries: Vec<HighscoreEntry>,
}

impl HighscoreSnapshot {
    pub fn find(&self, player_id: i64) -> Option<&HighscoreEntry> {
        self.entries.iter().find(|e| e.player_id == player_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub player_id: i64,
    pub name: String,
    pub status: Option<String>,
    pub alliance_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayersSnapshot {
    pub timestamp: SourceTimestamp,
    pub players: Vec<PlayerEntry>,
}
