//! # Snapshot normalization
//!
//! Turns a [`RawObservation`] into a [`Snapshot`] whose timestamp is an absolute UTC instant.
//! Local server times are interpreted in the configured source timezone; the machine's own
//! timezone never takes part. An observation whose timestamp cannot be resolved is rejected,
//! it is never stamped with the collection time.

use crate::{
    error::{
        Error,
        Result,
    },
    metrics::{
        MetricPayload,
        RawObservation,
        Snapshot,
        SourceTimestamp,
    },
};
use chrono::{
    DateTime,
    LocalResult,
    NaiveDateTime,
    SubsecRound,
    TimeZone,
    Utc,
};
use chrono_tz::Tz;

const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    source_timezone: Tz,
}

impl Normalizer {
    pub fn new(source_timezone: Tz) -> Self {
        Self { source_timezone }
    }

    pub fn normalize(&self, raw: &RawObservation) -> Result<Snapshot> {
        let reject = |reason: String| Error::NormalizationFailed {
            metric_type: raw.metric_type,
            reason,
        };

        let timestamp = self.resolve(&raw.source_timestamp).map_err(reject)?;
        if raw.entry.rank == 0 {
            return Err(reject("rank must be positive".to_string()));
        }
        if raw.entry.player_id != raw.player_id {
            return Err(reject(format!(
                "entry belongs to player {} instead of {}",
                raw.entry.player_id, raw.player_id
            )));
        }

        Ok(Snapshot {
            server_id: raw.server_id.clone(),
            player_id: raw.player_id,
            timestamp,
            payload: MetricPayload::from_entry(raw.metric_type, &raw.entry),
            collected_at: raw.collected_at,
        })
    }

    /// Resolves a source timestamp to a UTC instant with whole-second precision. Sub-second parts
    /// are truncated, the stored identity key counts whole seconds.
    pub fn resolve(&self, source: &SourceTimestamp) -> Result<DateTime<Utc>, String> {
        let instant = match source {
            SourceTimestamp::Missing => Err("response carries no timestamp".to_string()),
            SourceTimestamp::Epoch(epoch) if *epoch <= 0 => Err(format!("non-positive epoch {epoch}")),
            SourceTimestamp::Epoch(epoch) => {
                DateTime::from_timestamp(*epoch, 0).ok_or_else(|| format!("epoch {epoch} out of range"))
            }
            SourceTimestamp::Local(raw) => self.resolve_local(raw),
        }?;
        Ok(instant.trunc_subsecs(0))
    }

    fn resolve_local(&self, raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
            return Ok(with_offset.with_timezone(&Utc));
        }

        let naive = LOCAL_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .ok_or_else(|| format!("unrecognized timestamp {raw:?}"))?;

        match self.source_timezone.from_local_datetime(&naive) {
            LocalResult::Single(local) => Ok(local.with_timezone(&Utc)),
            // Autumn fold: the first occurrence is the one the server reached first.
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => Err(format!("{raw:?} does not exist in {}", self.source_timezone)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::HighscoreEntry,
        metrics::MetricType,
    };
    use pretty_assertions::assert_eq;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn raw(source_timestamp: SourceTimestamp, collected_at: DateTime<Utc>) -> RawObservation {
        RawObservation {
            server_id: "s256-fr".to_string(),
            player_id: 100,
            metric_type: MetricType::Economy,
            source_timestamp,
            entry: HighscoreEntry {
                player_id: 100,
                rank: 12,
                points: 34_567,
                ships: None,
            },
            collected_at,
        }
    }

    #[test]
    fn source_timestamp_wins_over_collection_time() {
        let normalizer = Normalizer::new(chrono_tz::UTC);
        let collected_at = utc("2024-05-02T03:00:00Z");
        let snapshot = normalizer
            .normalize(&raw(SourceTimestamp::Local("2024-05-01T10:00:00".to_string()), collected_at))
            .unwrap();

        assert_eq!(snapshot.timestamp, utc("2024-05-01T10:00:00Z"));
        assert_eq!(snapshot.collected_at, collected_at);
        assert_eq!(snapshot.metric_type(), MetricType::Economy);
        assert_eq!(snapshot.points(), 34_567);
    }

    #[test]
    fn local_times_use_the_source_timezone() {
        let normalizer = Normalizer::new(chrono_tz::Europe::Paris);
        let resolve = |s: &str| normalizer.resolve(&SourceTimestamp::Local(s.to_string()));

        assert_eq!(resolve("2024-05-01 10:00:00"), Ok(utc("2024-05-01T08:00:00Z")));
        assert_eq!(resolve("2024-01-15T10:00:00"), Ok(utc("2024-01-15T09:00:00Z")));
        assert_eq!(resolve("2024-05-01T10:00:00+00:00"), Ok(utc("2024-05-01T10:00:00Z")));
        // 02:30 happens twice on 2024-10-27 in Paris.
        assert_eq!(resolve("2024-10-27 02:30:00"), Ok(utc("2024-10-27T00:30:00Z")));
        // and never on 2024-03-31.
        assert!(resolve("2024-03-31 02:30:00").is_err());
    }

    #[test]
    fn fractional_seconds_are_truncated() {
        let normalizer = Normalizer::new(chrono_tz::UTC);
        let early = normalizer
            .normalize(&raw(SourceTimestamp::Local("2024-05-01T10:00:00.200Z".to_string()), Utc::now()))
            .unwrap();
        let late = normalizer
            .normalize(&raw(SourceTimestamp::Local("2024-05-01T10:00:00.700+00:00".to_string()), Utc::now()))
            .unwrap();

        assert_eq!(early.timestamp, utc("2024-05-01T10:00:00Z"));
        assert_eq!(early.timestamp, late.timestamp);
        assert_eq!(early.key(), late.key());
    }

    #[test]
    fn epochs_are_absolute() {
        let normalizer = Normalizer::new(chrono_tz::Asia::Tokyo);
        assert_eq!(
            normalizer.resolve(&SourceTimestamp::Epoch(1_700_000_000)),
            Ok(utc("2023-11-14T22:13:20Z"))
        );
    }

    #[test]
    fn unusable_timestamps_are_rejected() {
        let normalizer = Normalizer::new(chrono_tz::UTC);
        let now = Utc::now();
        for source in [
            SourceTimestamp::Missing,
            SourceTimestamp::Epoch(0),
            SourceTimestamp::Epoch(-5),
            SourceTimestamp::Epoch(i64::MAX),
            SourceTimestamp::Local("yesterday".to_string()),
        ] {
            let err = normalizer.normalize(&raw(source.clone(), now)).unwrap_err();
            assert!(
                matches!(err, Error::NormalizationFailed { metric_type: MetricType::Economy, .. }),
                "{source}: {err}"
            );
        }
    }

    #[test]
    fn rejects_mismatched_entries() {
        let normalizer = Normalizer::new(chrono_tz::UTC);
        let mut observation = raw(SourceTimestamp::Epoch(1_700_000_000), Utc::now());
        observation.entry.player_id = 7;
        assert!(normalizer.normalize(&observation).is_err());
    }
}
