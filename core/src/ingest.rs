//! # Ingestion
//!
//! Writes candidate snapshots through [`SnapshotStore::insert_if_absent`]. Each candidate is
//! independent: a duplicate is counted, a failed write is counted and reported, and neither stops
//! the batch. Ingesting a batch twice inserts nothing the second time.

use crate::{
    metrics::Snapshot,
    store::SnapshotStore,
};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// One line per failed candidate.
    pub failures: Vec<String>,
}

impl IngestResult {
    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.failed
    }

    /// Every candidate failed to write. An empty batch is not a failure.
    pub fn is_total_store_failure(&self) -> bool {
        self.failed > 0 && self.inserted == 0 && self.duplicates == 0
    }
}

pub struct Ingestor<'a> {
    store: &'a dyn SnapshotStore,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn SnapshotStore) -> Self {
        Self { store }
    }

    pub async fn ingest(&self, candidates: &[Snapshot]) -> IngestResult {
        let mut result = IngestResult::default();

        for candidate in candidates {
            match self.store.insert_if_absent(candidate).await {
                Ok(true) => result.inserted += 1,
                Ok(false) => {
                    debug!(key = %candidate.key(), "Snapshot already stored");
                    result.duplicates += 1;
                }
                Err(e) => {
                    let key = candidate.key();
                    warn!(%key, error = %e, "Snapshot write failed");
                    result.failed += 1;
                    result.failures.push(format!("{key}: {e}"));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::HighscoreEntry,
        error::{
            Error,
            Result,
        },
        metrics::{
            MetricPayload,
            MetricType,
        },
        store::Store,
    };
    use chrono::{
        DateTime,
        Duration,
        TimeZone,
        Utc,
    };
    use futures::future::BoxFuture;
    use pretty_assertions::assert_eq;

    fn batch(n: usize) -> Vec<Snapshot> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Snapshot {
                server_id: "s256-fr".to_string(),
                player_id: 100,
                timestamp: start + Duration::hours(i as i64),
                payload: MetricPayload::from_entry(
                    MetricType::Global,
                    &HighscoreEntry {
                        player_id: 100,
                        rank: 1,
                        points: i as i64,
                        ships: None,
                    },
                ),
                collected_at: start,
            })
            .collect()
    }

    #[tokio::test]
    async fn ingest_is_idempotent() {
        for n in [0, 1, 5] {
            let store = Store::in_memory().await.unwrap();
            let ingestor = Ingestor::new(&store);
            let candidates = batch(n);

            let first = ingestor.ingest(&candidates).await;
            assert_eq!((first.inserted, first.duplicates, first.failed), (n, 0, 0));

            let second = ingestor.ingest(&candidates).await;
            assert_eq!((second.inserted, second.duplicates, second.failed), (0, n, 0));
            assert_eq!(store.count_snapshots().await.unwrap(), n as u64);
        }
    }

    #[tokio::test]
    async fn duplicates_inside_one_batch_are_counted() {
        let store = Store::in_memory().await.unwrap();
        let mut candidates = batch(2);
        candidates.push(candidates[0].clone());
        candidates.reverse();

        let result = Ingestor::new(&store).ingest(&candidates).await;
        assert_eq!((result.inserted, result.duplicates), (2, 1));
        assert!(!result.is_total_store_failure());
    }

    /// Fails every write of a snapshot whose points are odd.
    struct FlakyStore {
        inner: Store,
    }

    impl SnapshotStore for FlakyStore {
        fn insert_if_absent<'a>(&'a self, snapshot: &'a Snapshot) -> BoxFuture<'a, Result<bool>> {
            if snapshot.points() % 2 == 1 {
                return Box::pin(async { Err(Error::StoreWriteFailed("disk full".to_string())) });
            }
            self.inner.insert_if_absent(snapshot)
        }

        fn query_range<'a>(
            &'a self,
            server_id: &'a str,
            player_id: i64,
            metric_type: MetricType,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> BoxFuture<'a, Result<Vec<Snapshot>>> {
            self.inner.query_range(server_id, player_id, metric_type, from, to)
        }

        fn latest<'a>(
            &'a self,
            server_id: &'a str,
            player_id: i64,
            metric_type: MetricType,
        ) -> BoxFuture<'a, Result<Option<Snapshot>>> {
            self.inner.latest(server_id, player_id, metric_type)
        }
    }

    #[tokio::test]
    async fn a_failed_write_does_not_stop_the_batch() {
        let store = FlakyStore {
            inner: Store::in_memory().await.unwrap(),
        };
        let result = Ingestor::new(&store).ingest(&batch(5)).await;

        assert_eq!((result.inserted, result.duplicates, result.failed), (3, 0, 2));
        assert_eq!(result.failures.len(), 2);
        assert!(result.failures[0].starts_with("s256-fr/100/global@"), "{}", result.failures[0]);
        assert!(result.failures[0].contains("disk full"));
        assert_eq!(store.inner.count_snapshots().await.unwrap(), 3);
        assert!(!result.is_total_store_failure());
    }

    #[tokio::test]
    async fn all_writes_failing_is_a_total_failure() {
        let store = FlakyStore {
            inner: Store::in_memory().await.unwrap(),
        };
        let odd: Vec<Snapshot> = batch(4).into_iter().filter(|s| s.points() % 2 == 1).collect();

        let result = Ingestor::new(&store).ingest(&odd).await;
        assert_eq!(result.failed, 2);
        assert!(result.is_total_store_failure());
        assert!(!IngestResult::default().is_total_store_failure());
    }
}
