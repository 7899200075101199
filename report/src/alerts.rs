//! # Alerts
//!
//! After a collection, the latest update of each main category is checked against the configured
//! thresholds. What fires is posted to the webhook, at most once per category within the
//! cooldown, and logged in the store so the report can list it.

use crate::{
    aggregate::{
        mean_abs_delta,
        Delta,
        MetricHistory,
    },
    error::Result,
    render::{
        format_signed,
        MAIN_METRICS,
    },
    webhook::DiscordWebhook,
};
use chrono::{
    DateTime,
    Duration,
    Utc,
};
use ogame_stats_config::AlertThresholds;
use ogame_stats_core::{
    AlertRecord,
    MetricType,
    Snapshot,
    SnapshotStore,
    Store,
};
use serde_json::{
    json,
    Value,
};

pub const ALERT_COLOR: u32 = 0xFFCC00;

/// The category whose updates are checked for spikes instead of rank and 24h moves.
const SPIKE_METRIC: MetricType = MetricType::MilitaryLost;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertKind {
    /// Climbed at least `rank_jump_1h` places at one update.
    Top,
    /// Lost at least `rank_drop_1h` places at one update.
    Flop,
    /// Points moved by `ratio` of their value over 24 hours.
    Move24h { ratio: f64 },
    /// One update moved `factor` times the weekly mean.
    Spike { factor: f64, mean_abs: f64 },
}

impl AlertKind {
    fn tag(&self) -> &'static str {
        match self {
            AlertKind::Top => "TOP",
            AlertKind::Flop => "FLOP",
            AlertKind::Move24h { .. } => "PCT24H",
            AlertKind::Spike { .. } => "SPIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub metric_type: MetricType,
    pub delta: Delta,
    /// API timestamp of the snapshot that raised it.
    pub api_timestamp: DateTime<Utc>,
}

/// Who the alerts are about.
#[derive(Debug, Clone)]
pub struct AlertSubject {
    pub server_id: String,
    pub player_id: i64,
    pub player_name: String,
    pub universe_name: String,
}

impl Alert {
    /// Cooldown key, e.g. `TOP:global`.
    pub fn category(&self) -> String {
        format!("{}:{}", self.kind.tag(), self.metric_type)
    }

    pub fn title(&self, subject: &AlertSubject) -> String {
        let who = format!("{} ({})", subject.player_name, subject.universe_name);
        let label = self.metric_type.label();
        match self.kind {
            AlertKind::Top => format!("TOP {label} • {who}"),
            AlertKind::Flop => format!("FLOP {label} • {who}"),
            AlertKind::Move24h { .. } => format!("24h move {label} • {who}"),
            AlertKind::Spike { .. } => format!("{label} spike • {who}"),
        }
    }

    pub fn body(&self) -> String {
        let points = format_signed(self.delta.points);
        let rank = format_signed(self.delta.rank);
        match self.kind {
            AlertKind::Top => format!("Rank: {rank} places • Points: {points}"),
            AlertKind::Flop => format!("Rank: {rank} places • Points: {points}"),
            AlertKind::Move24h { ratio } => {
                format!("24h: {points} points ({:.2}%) • Rank: {rank}", ratio * 100.0)
            }
            AlertKind::Spike { factor, mean_abs } => {
                format!("Last update: {points} • x{factor:.1} the weekly mean (~{mean_abs:.0})")
            }
        }
    }

    pub fn payload(&self, subject: &AlertSubject) -> Value {
        json!({
            "embeds": [{
                "title": self.title(subject),
                "description": self.body(),
                "color": ALERT_COLOR,
                "timestamp": self.api_timestamp.to_rfc3339(),
            }]
        })
    }
}

/// Alerts raised by the latest update of one category.
pub fn check(metric_type: MetricType, history: &MetricHistory, thresholds: &AlertThresholds) -> Vec<Alert> {
    let Some(latest) = history.latest() else {
        return Vec::new();
    };
    let alert = |kind, delta| Alert {
        kind,
        metric_type,
        delta,
        api_timestamp: latest.timestamp,
    };
    let mut alerts = Vec::new();

    if metric_type == SPIKE_METRIC {
        if let Some(delta) = history.last_update_delta() {
            let series: Vec<i64> = history
                .weekly_series(latest.timestamp)
                .iter()
                .map(Snapshot::points)
                .collect();
            let mean_abs = mean_abs_delta(&series);
            if mean_abs > 0.0 && delta.points.abs() as f64 >= thresholds.lost_spike_factor * mean_abs {
                alerts.push(alert(
                    AlertKind::Spike {
                        factor: thresholds.lost_spike_factor,
                        mean_abs,
                    },
                    delta,
                ));
            }
        }
        return alerts;
    }

    if let Some(delta) = history.last_update_delta() {
        if delta.rank >= thresholds.rank_jump_1h {
            alerts.push(alert(AlertKind::Top, delta));
        } else if delta.rank <= -thresholds.rank_drop_1h {
            alerts.push(alert(AlertKind::Flop, delta));
        }
    }

    if let Some(delta) = history.rolling_24h_delta() {
        let base = (latest.points() - delta.points).max(1);
        let ratio = delta.points.abs() as f64 / base as f64;
        if ratio >= thresholds.pct_change_24h {
            alerts.push(alert(AlertKind::Move24h { ratio }, delta));
        }
    }

    alerts
}

/// Checks the main categories and `military_lost` as stored up to `now`.
pub async fn evaluate(
    store: &dyn SnapshotStore,
    server_id: &str,
    player_id: i64,
    now: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Result<Vec<Alert>> {
    let mut alerts = Vec::new();
    for metric_type in MAIN_METRICS.into_iter().chain([SPIKE_METRIC]) {
        let history = MetricHistory::load(store, server_id, player_id, metric_type, now).await?;
        alerts.extend(check(metric_type, &history, thresholds));
    }
    debug!(server_id, player_id, raised = alerts.len(), "Alerts evaluated");
    Ok(alerts)
}

/// Posts every alert whose category is out of its cooldown and logs it. A failed post is logged
/// and skipped, so it is retried at the next collection. Returns the categories sent.
pub async fn dispatch(
    store: &Store,
    webhook: &DiscordWebhook,
    subject: &AlertSubject,
    alerts: &[Alert],
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    let mut sent = Vec::new();
    for alert in alerts {
        let category = alert.category();
        let last = store
            .alerts()
            .last_sent(&subject.server_id, subject.player_id, &category)
            .await?;
        if let Some(last) = last.filter(|last| now - *last < cooldown) {
            debug!(%category, %last, "Alert in cooldown");
            continue;
        }

        match webhook.send(alert.payload(subject), None).await {
            Ok(delivery) => {
                let record = AlertRecord {
                    category: category.clone(),
                    created_at: now,
                    api_timestamp: alert.api_timestamp,
                };
                store.alerts().log(&subject.server_id, subject.player_id, &record).await?;
                info!(%category, ?delivery, "Alert sent");
                sent.push(category);
            }
            Err(e) => warn!(%category, error = %e, "Alert not sent"),
        }
    }
    Ok(sent)
}

/// `TOP:global` → `TOP Global`. Unknown categories are shown as stored.
pub fn describe_category(category: &str) -> String {
    match category.split_once(':') {
        Some((tag, metric)) => match metric.parse::<MetricType>() {
            Ok(metric_type) => format!("{tag} {}", metric_type.label()),
            Err(_) => category.to_string(),
        },
        None => category.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::snap;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use reqwest::Client;
    use url::Url;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn history(metric_type: MetricType, points: &[(DateTime<Utc>, i64, u32)]) -> MetricHistory {
        MetricHistory::new(points.iter().map(|(t, p, r)| snap(metric_type, *t, *p, *r)).collect())
    }

    fn subject() -> AlertSubject {
        AlertSubject {
            server_id: "s256-fr".to_string(),
            player_id: 100,
            player_name: "Galoup".to_string(),
            universe_name: "Fornax".to_string(),
        }
    }

    fn kinds(alerts: &[Alert]) -> Vec<String> {
        alerts.iter().map(Alert::category).collect()
    }

    #[test]
    fn rank_jumps_and_drops() {
        let thresholds = AlertThresholds::default();
        let up = history(MetricType::Economy, &[(at(2, 9), 1_000_000, 130), (at(2, 10), 1_000_100, 100)]);
        assert_eq!(kinds(&check(MetricType::Economy, &up, &thresholds)), vec!["TOP:economy"]);

        let down = history(MetricType::Research, &[(at(2, 9), 1_000_000, 100), (at(2, 10), 999_900, 125)]);
        let alerts = check(MetricType::Research, &down, &thresholds);
        assert_eq!(kinds(&alerts), vec!["FLOP:research"]);
        assert_eq!(alerts[0].delta, Delta { points: -100, rank: -25 });
        assert_eq!(alerts[0].api_timestamp, at(2, 10));

        let calm = history(MetricType::Global, &[(at(2, 9), 1_000_000, 100), (at(2, 10), 1_000_100, 90)]);
        assert!(check(MetricType::Global, &calm, &thresholds).is_empty());
        assert!(check(MetricType::Global, &MetricHistory::default(), &thresholds).is_empty());
    }

    #[test]
    fn large_24h_moves() {
        let thresholds = AlertThresholds::default();
        // +1 000 on 100 000 is 1 %, above the 0.6 % default.
        let h = history(MetricType::Global, &[(at(1, 10), 100_000, 50), (at(2, 10), 101_000, 49)]);
        let alerts = check(MetricType::Global, &h, &thresholds);
        assert_eq!(kinds(&alerts), vec!["PCT24H:global"]);
        match alerts[0].kind {
            AlertKind::Move24h { ratio } => assert!((ratio - 0.01).abs() < 1e-9),
            other => panic!("expected a 24h move, got {other:?}"),
        }
        assert_eq!(alerts[0].body(), "24h: +1 000 points (1.00%) • Rank: +1");

        let small = history(MetricType::Global, &[(at(1, 10), 100_000, 50), (at(2, 10), 100_500, 50)]);
        assert!(check(MetricType::Global, &small, &thresholds).is_empty());
    }

    #[test]
    fn lost_spikes_against_the_weekly_mean() {
        let thresholds = AlertThresholds::default();
        let mut points = vec![
            (at(1, 0), 0, 10),
            (at(1, 6), 10, 10),
            (at(1, 12), 20, 10),
            (at(1, 18), 30, 10),
            (at(1, 21), 40, 10),
        ];
        points.push((at(2, 0), 140, 9));
        let h = history(MetricType::MilitaryLost, &points);
        // Moves 10, 10, 10, 10, 100: mean 28, and 100 >= 2.5 * 28.
        let alerts = check(MetricType::MilitaryLost, &h, &thresholds);
        assert_eq!(kinds(&alerts), vec!["SPIKE:military_lost"]);
        assert_eq!(
            alerts[0].body(),
            "Last update: +100 • x2.5 the weekly mean (~28)"
        );

        let steady = history(MetricType::MilitaryLost, &points[..5]);
        assert!(check(MetricType::MilitaryLost, &steady, &thresholds).is_empty());
    }

    #[test]
    fn categories_are_described() {
        assert_eq!(describe_category("TOP:global"), "TOP Global");
        assert_eq!(describe_category("SPIKE:military_lost"), "SPIKE Military lost");
        assert_eq!(describe_category("custom"), "custom");
    }

    async fn store_with(points: &[(MetricType, DateTime<Utc>, i64, u32)]) -> Store {
        let store = Store::in_memory().await.unwrap();
        for (m, t, p, r) in points {
            store.insert_if_absent(&snap(*m, *t, *p, *r)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn evaluates_stored_history() {
        let store = store_with(&[
            (MetricType::Global, at(2, 9), 1_000_000, 150),
            (MetricType::Global, at(2, 10), 1_000_100, 100),
            (MetricType::Honor, at(2, 9), 0, 900),
            (MetricType::Honor, at(2, 10), 0, 100),
        ])
        .await;

        let alerts = evaluate(&store, "s256-fr", 100, at(2, 11), &AlertThresholds::default())
            .await
            .unwrap();
        assert_eq!(kinds(&alerts), vec!["TOP:global"]);

        let before = evaluate(&store, "s256-fr", 100, at(2, 9), &AlertThresholds::default())
            .await
            .unwrap();
        assert!(before.is_empty());
    }

    #[tokio::test]
    async fn dispatch_respects_the_cooldown() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::Regex("TOP Global".to_string()))
            .with_status(204)
            .expect(2)
            .create_async()
            .await;
        let webhook = DiscordWebhook::new(
            Some(Url::parse(&format!("{}/hook", server.url())).unwrap()),
            "OGame Stats",
            None,
            false,
            Client::new(),
        );

        let store = Store::in_memory().await.unwrap();
        let alerts = vec![Alert {
            kind: AlertKind::Top,
            metric_type: MetricType::Global,
            delta: Delta { points: 100, rank: 50 },
            api_timestamp: at(2, 10),
        }];
        let cooldown = Duration::minutes(180);

        let sent = dispatch(&store, &webhook, &subject(), &alerts, cooldown, at(2, 10)).await.unwrap();
        assert_eq!(sent, vec!["TOP:global".to_string()]);
        let sent = dispatch(&store, &webhook, &subject(), &alerts, cooldown, at(2, 12)).await.unwrap();
        assert!(sent.is_empty());
        let sent = dispatch(&store, &webhook, &subject(), &alerts, cooldown, at(2, 13)).await.unwrap();
        assert_eq!(sent.len(), 1);

        hook.assert_async().await;
        let logged = store.alerts().since("s256-fr", 100, at(1, 0), 10).await.unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].created_at, at(2, 13));
        assert_eq!(logged[0].api_timestamp, at(2, 10));
    }

    #[tokio::test]
    async fn failed_posts_are_not_logged() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/hook").with_status(500).create_async().await;
        let webhook = DiscordWebhook::new(
            Some(Url::parse(&format!("{}/hook", server.url())).unwrap()),
            "OGame Stats",
            None,
            false,
            Client::new(),
        );

        let store = Store::in_memory().await.unwrap();
        let alerts = vec![Alert {
            kind: AlertKind::Flop,
            metric_type: MetricType::Military,
            delta: Delta { points: -5, rank: -40 },
            api_timestamp: at(2, 10),
        }];
        let sent = dispatch(&store, &webhook, &subject(), &alerts, Duration::minutes(180), at(2, 10))
            .await
            .unwrap();
        assert!(sent.is_empty());
        assert_eq!(store.alerts().last_sent("s256-fr", 100, "FLOP:military").await.unwrap(), None);
    }
}
