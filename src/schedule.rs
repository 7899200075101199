//! # Schedule
//!
//! Clock arithmetic for the `run` daemon. Collections are aligned on multiples of
//! `collect_minutes` since the Unix epoch (plus a few seconds so the API has published), the
//! recap fires once a day at `recap_time` in the report timezone.

use chrono::{
    DateTime,
    Days,
    Duration,
    NaiveDate,
    NaiveDateTime,
    NaiveTime,
    TimeZone,
    Utc,
};
use chrono_tz::Tz;

const COLLECT_OFFSET_SECONDS: i64 = 10;
const RECAP_OFFSET_SECONDS: i64 = 15;
/// A job is still run when the loop wakes up this late after its boundary.
pub const GRACE_SECONDS: i64 = 180;
/// Upper bound on a single sleep, so clock jumps are noticed.
pub const MAX_SLEEP_SECONDS: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    collect_seconds: i64,
    recap_time: NaiveTime,
    timezone: Tz,
}

/// Resolves a wall-clock time, taking the earlier instant on a fold and the first valid time
/// after a gap.
fn local_to_utc(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = naive;
    for _ in 0..4 {
        if let Some(t) = tz.from_local_datetime(&candidate).earliest() {
            return t.with_timezone(&Utc);
        }
        candidate += Duration::minutes(30);
    }
    Utc.from_utc_datetime(&naive)
}

impl Schedule {
    pub fn new(collect_minutes: u32, recap_time: NaiveTime, timezone: Tz) -> Self {
        Self {
            collect_seconds: i64::from(collect_minutes.max(1)) * 60,
            recap_time,
            timezone,
        }
    }

    /// Latest collect boundary at or before `now`.
    pub fn previous_collect(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let shifted = now.timestamp() - COLLECT_OFFSET_SECONDS;
        let boundary = shifted.div_euclid(self.collect_seconds) * self.collect_seconds + COLLECT_OFFSET_SECONDS;
        DateTime::from_timestamp(boundary, 0).unwrap_or(now)
    }

    /// First collect boundary strictly after `now`.
    pub fn next_collect(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.previous_collect(now) + Duration::seconds(self.collect_seconds)
    }

    fn recap_on(&self, date: NaiveDate) -> DateTime<Utc> {
        local_to_utc(self.timezone, date.and_time(self.recap_time)) + Duration::seconds(RECAP_OFFSET_SECONDS)
    }

    /// Latest recap instant at or before `now`, with the local date it belongs to.
    pub fn previous_recap(&self, now: DateTime<Utc>) -> (NaiveDate, DateTime<Utc>) {
        let today = now.with_timezone(&self.timezone).date_naive();
        let target = self.recap_on(today);
        if target <= now {
            return (today, target);
        }
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        (yesterday, self.recap_on(yesterday))
    }

    /// First recap instant strictly after `now`.
    pub fn next_recap(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.timezone).date_naive();
        let target = self.recap_on(today);
        if now < target {
            return target;
        }
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        self.recap_on(tomorrow)
    }
}

/// `now` is within the grace window that follows `boundary`.
pub fn is_due(now: DateTime<Utc>, boundary: DateTime<Utc>) -> bool {
    let late = now - boundary;
    late >= Duration::zero() && late <= Duration::seconds(GRACE_SECONDS)
}

/// Jobs to run now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Due {
    pub collect: Option<DateTime<Utc>>,
    pub recap: Option<NaiveDate>,
}

/// Remembers which boundaries already ran so one wake-up inside the grace window never
/// triggers a job twice.
#[derive(Debug, Clone)]
pub struct Scheduler {
    schedule: Schedule,
    last_collect: Option<DateTime<Utc>>,
    last_recap: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            last_collect: None,
            last_recap: None,
        }
    }

    pub fn due(&self, now: DateTime<Utc>) -> Due {
        let boundary = self.schedule.previous_collect(now);
        let collect = (is_due(now, boundary) && self.last_collect != Some(boundary)).then_some(boundary);

        let (date, at) = self.schedule.previous_recap(now);
        let recap = (is_due(now, at) && self.last_recap != Some(date)).then_some(date);

        Due { collect, recap }
    }

    pub fn collected(&mut self, boundary: DateTime<Utc>) {
        self.last_collect = Some(boundary);
    }

    pub fn recapped(&mut self, date: NaiveDate) {
        self.last_recap = Some(date);
    }

    /// Next instant worth waking up for.
    pub fn next_wake(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.schedule.next_collect(now).min(self.schedule.next_recap(now))
    }

    /// How long to sleep before looking again, capped at [`MAX_SLEEP_SECONDS`].
    pub fn sleep_for(&self, now: DateTime<Utc>) -> std::time::Duration {
        let seconds = (self.next_wake(now) - now)
            .num_seconds()
            .clamp(1, MAX_SLEEP_SECONDS);
        std::time::Duration::from_secs(seconds as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn hourly() -> Schedule {
        Schedule::new(60, NaiveTime::from_hms_opt(21, 0, 0).unwrap(), chrono_tz::Europe::Paris)
    }

    #[test]
    fn collect_boundaries_are_aligned() {
        let s = hourly();
        assert_eq!(s.previous_collect(utc("2024-05-01T10:30:00Z")), utc("2024-05-01T10:00:10Z"));
        assert_eq!(s.next_collect(utc("2024-05-01T10:30:00Z")), utc("2024-05-01T11:00:10Z"));
        // Before the offset the previous hour is still current.
        assert_eq!(s.previous_collect(utc("2024-05-01T10:00:05Z")), utc("2024-05-01T09:00:10Z"));
        assert_eq!(s.next_collect(utc("2024-05-01T10:00:10Z")), utc("2024-05-01T11:00:10Z"));

        let quarter = Schedule::new(15, NaiveTime::from_hms_opt(21, 0, 0).unwrap(), chrono_tz::UTC);
        assert_eq!(quarter.previous_collect(utc("2024-05-01T10:31:00Z")), utc("2024-05-01T10:30:10Z"));
    }

    #[test]
    fn recap_follows_the_report_timezone() {
        let s = hourly();
        // 21:00 Paris is 19:00 UTC in summer.
        assert_eq!(s.next_recap(utc("2024-05-01T18:00:00Z")), utc("2024-05-01T19:00:15Z"));
        assert_eq!(s.next_recap(utc("2024-05-01T19:00:15Z")), utc("2024-05-02T19:00:15Z"));
        assert_eq!(
            s.previous_recap(utc("2024-05-01T19:01:00Z")),
            (NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), utc("2024-05-01T19:00:15Z"))
        );
        assert_eq!(
            s.previous_recap(utc("2024-05-01T18:00:00Z")).0,
            NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()
        );
        // And 20:00 UTC in winter.
        assert_eq!(s.next_recap(utc("2024-01-10T12:00:00Z")), utc("2024-01-10T20:00:15Z"));
    }

    #[test]
    fn recap_time_in_a_gap_moves_forward() {
        let s = Schedule::new(60, NaiveTime::from_hms_opt(2, 30, 0).unwrap(), chrono_tz::Europe::Paris);
        // 02:30 does not exist on 2024-03-31 in Paris; 03:00 CEST is 01:00 UTC.
        assert_eq!(s.next_recap(utc("2024-03-30T23:00:00Z")), utc("2024-03-31T01:00:15Z"));
    }

    #[test]
    fn due_jobs_run_once_per_boundary() {
        let mut scheduler = Scheduler::new(hourly());

        let now = utc("2024-05-01T19:01:00Z");
        let due = scheduler.due(now);
        assert_eq!(due.collect, Some(utc("2024-05-01T19:00:10Z")));
        assert_eq!(due.recap, NaiveDate::from_ymd_opt(2024, 5, 1));

        scheduler.collected(utc("2024-05-01T19:00:10Z"));
        scheduler.recapped(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(scheduler.due(utc("2024-05-01T19:02:00Z")), Due::default());

        // Past the grace window nothing is due.
        assert_eq!(Scheduler::new(hourly()).due(utc("2024-05-01T19:30:00Z")), Due::default());
    }

    #[test]
    fn sleeps_are_capped() {
        let scheduler = Scheduler::new(hourly());
        assert_eq!(scheduler.sleep_for(utc("2024-05-01T10:30:00Z")), std::time::Duration::from_secs(30));
        assert_eq!(scheduler.sleep_for(utc("2024-05-01T11:00:05Z")), std::time::Duration::from_secs(5));
        assert_eq!(scheduler.sleep_for(utc("2024-05-01T11:00:10Z")), std::time::Duration::from_secs(30));
    }
}
