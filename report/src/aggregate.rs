//! # Aggregation
//!
//! Deltas over one metric's history. The history is read once through
//! [`SnapshotStore::query_range`]; everything after that is pure.

use crate::error::Result;
use chrono::{
    DateTime,
    Duration,
    Utc,
};
use ogame_stats_core::{
    MetricType,
    Snapshot,
    SnapshotStore,
};
use serde::Serialize;

/// Change between two snapshots. `rank` is positive when the player climbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delta {
    pub points: i64,
    pub rank: i64,
}

impl Delta {
    /// `None` when either end is missing or both ends are the same snapshot.
    pub fn between(from: Option<&Snapshot>, to: Option<&Snapshot>) -> Option<Delta> {
        let (from, to) = (from?, to?);
        if from.timestamp == to.timestamp {
            return None;
        }
        Some(Delta {
            points: to.points() - from.points(),
            rank: i64::from(from.rank()) - i64::from(to.rank()),
        })
    }

    pub fn is_zero(&self) -> bool {
        self.points == 0 && self.rank == 0
    }
}

/// Every stored snapshot of one metric type for one player, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MetricHistory {
    snapshots: Vec<Snapshot>,
}

impl MetricHistory {
    pub fn new(mut snapshots: Vec<Snapshot>) -> Self {
        snapshots.sort_by_key(|s| s.timestamp);
        Self { snapshots }
    }

    /// Reads the history up to and including `until`.
    pub async fn load(
        store: &dyn SnapshotStore,
        server_id: &str,
        player_id: i64,
        metric_type: MetricType,
        until: DateTime<Utc>,
    ) -> Result<Self> {
        let snapshots = store
            .query_range(server_id, player_id, metric_type, DateTime::<Utc>::MIN_UTC, until)
            .await?;
        Ok(Self::new(snapshots))
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.snapshots.len().checked_sub(2).map(|i| &self.snapshots[i])
    }

    pub fn at_or_before(&self, instant: DateTime<Utc>) -> Option<&Snapshot> {
        let idx = self.snapshots.partition_point(|s| s.timestamp <= instant);
        idx.checked_sub(1).map(|i| &self.snapshots[i])
    }

    pub fn first_after(&self, instant: DateTime<Utc>) -> Option<&Snapshot> {
        let idx = self.snapshots.partition_point(|s| s.timestamp <= instant);
        self.snapshots.get(idx)
    }

    /// Latest against the one before it.
    pub fn last_update_delta(&self) -> Option<Delta> {
        Delta::between(self.previous(), self.latest())
    }

    /// Latest against the snapshot 24 hours earlier, or the first one after that point when the
    /// history starts later.
    pub fn rolling_24h_delta(&self) -> Option<Delta> {
        let latest = self.latest()?;
        let target = latest.timestamp - Duration::hours(24);
        let base = self.at_or_before(target).or_else(|| self.first_after(target));
        Delta::between(base, Some(latest))
    }

    /// Standing at `end` against standing at `start`, both taken at-or-before.
    pub fn daily_delta(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Delta> {
        Delta::between(self.at_or_before(start), self.at_or_before(end))
    }

    /// Snapshots within the seven days up to `end`.
    pub fn weekly_series(&self, end: DateTime<Utc>) -> &[Snapshot] {
        let from = end - Duration::days(7);
        let lo = self.snapshots.partition_point(|s| s.timestamp < from);
        let hi = self.snapshots.partition_point(|s| s.timestamp <= end);
        &self.snapshots[lo..hi.max(lo)]
    }
}

/// Mean absolute change between consecutive values; 0 for fewer than two.
pub fn mean_abs_delta(points: &[i64]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let total: i64 = points.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    total as f64 / (points.len() - 1) as f64
}
