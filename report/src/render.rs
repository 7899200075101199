//! # Rendering
//!
//! Builds a [`ReportData`] from the snapshot history and renders it as a terminal table or as a
//! standalone HTML page. Times are shown in the report timezone; the history itself stays UTC.

use crate::{
    aggregate::{
        mean_abs_delta,
        Delta,
        MetricHistory,
    },
    alerts::describe_category,
    error::{
        Error,
        Result,
    },
    templates::{
        self,
        REPORT_TEMPLATE,
    },
};
use chrono::{
    DateTime,
    Days,
    LocalResult,
    NaiveDate,
    NaiveTime,
    TimeZone,
    Utc,
};
use chrono_tz::Tz;
use comfy_table::{
    presets,
    Attribute,
    Cell,
    CellAlignment,
    Color,
    ContentArrangement,
    Table,
};
use ogame_stats_core::{
    AlertRecord,
    MetricType,
    Snapshot,
    SnapshotStore,
};
use serde::Serialize;
use std::path::{
    Path,
    PathBuf,
};

/// Categories summarised in recaps and used for top/flop.
pub const MAIN_METRICS: [MetricType; 4] = [
    MetricType::Global,
    MetricType::Economy,
    MetricType::Research,
    MetricType::Military,
];

/// Sparklines show at most this many of the most recent points.
const SPARKLINE_POINTS: usize = 40;

/// `[start, end]` of a daily recap, as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecapWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn local_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(t) => Ok(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(Error::InvalidRecapTime {
            date: date.to_string(),
            time: time.format("%H:%M").to_string(),
            timezone: tz.to_string(),
        }),
    }
}

/// The recap of `date` covers the day before `recap_time` on that date, in `tz` wall-clock time.
pub fn recap_window(date: NaiveDate, recap_time: NaiveTime, tz: Tz) -> Result<RecapWindow> {
    let previous = date.checked_sub_days(Days::new(1)).unwrap_or(date);
    Ok(RecapWindow {
        start: local_instant(previous, recap_time, tz)?,
        end: local_instant(date, recap_time, tz)?,
    })
}

/// Who and when a report is about.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub server_id: String,
    pub universe_name: String,
    pub player_name: String,
    pub player_id: i64,
    pub report_date: NaiveDate,
    pub window: RecapWindow,
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct MetricCard {
    pub metric_type: MetricType,
    pub latest: Option<Snapshot>,
    pub last_delta: Option<Delta>,
    pub delta_24h: Option<Delta>,
    pub daily_delta: Option<Delta>,
    /// Points over the seven days up to the latest snapshot.
    pub series: Vec<i64>,
    pub mean_abs_delta: f64,
}

/// Rank change of one category at the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankMove {
    pub metric_type: MetricType,
    pub rank: i64,
    pub points: i64,
}

#[derive(Debug, Clone)]
pub struct ReportData {
    pub context: ReportContext,
    pub cards: Vec<MetricCard>,
    /// Most recent API timestamp across every category.
    pub snapshot_at: Option<DateTime<Utc>>,
    /// Alerts sent recently, newest first.
    pub alerts: Vec<AlertRecord>,
}

impl ReportData {
    /// Reads the history of every category through the store's read interface.
    pub async fn gather(store: &dyn SnapshotStore, context: ReportContext, now: DateTime<Utc>) -> Result<Self> {
        let mut cards = Vec::new();
        for metric_type in MetricType::all() {
            let history =
                MetricHistory::load(store, &context.server_id, context.player_id, metric_type, now).await?;
            cards.push(Self::card(metric_type, &history, &context.window));
        }
        let snapshot_at = cards
            .iter()
            .filter_map(|c| c.latest.as_ref().map(|s| s.timestamp))
            .max();
        debug!(server_id = %context.server_id, ?snapshot_at, "Report data gathered");

        Ok(Self {
            context,
            cards,
            snapshot_at,
            alerts: Vec::new(),
        })
    }

    pub fn with_alerts(mut self, alerts: Vec<AlertRecord>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn card(metric_type: MetricType, history: &MetricHistory, window: &RecapWindow) -> MetricCard {
        let latest = history.latest().cloned();
        let series_end = latest.as_ref().map_or(window.end, |s| s.timestamp);
        let series: Vec<i64> = history.weekly_series(series_end).iter().map(Snapshot::points).collect();
        MetricCard {
            metric_type,
            last_delta: history.last_update_delta(),
            delta_24h: history.rolling_24h_delta(),
            daily_delta: history.daily_delta(window.start, window.end),
            mean_abs_delta: mean_abs_delta(&series),
            series,
            latest,
        }
    }

    pub fn card_for(&self, metric_type: MetricType) -> Option<&MetricCard> {
        self.cards.iter().find(|c| c.metric_type == metric_type)
    }

    /// Main categories that moved at the last update, biggest rank change first.
    pub fn rank_moves(&self) -> Vec<RankMove> {
        let mut moves: Vec<RankMove> = MAIN_METRICS
            .iter()
            .filter_map(|m| {
                let delta = self.card_for(*m)?.last_delta?;
                (!delta.is_zero()).then_some(RankMove {
                    metric_type: *m,
                    rank: delta.rank,
                    points: delta.points,
                })
            })
            .collect();
        moves.sort_by_key(|m| std::cmp::Reverse(m.rank.abs()));
        moves
    }

    pub fn file_name(&self) -> String {
        report_file_name(self.context.report_date, &self.context.server_id, &self.context.player_name)
    }

    fn local(&self, instant: DateTime<Utc>, format: &str) -> String {
        instant.with_timezone(&self.context.timezone).format(format).to_string()
    }
}

/// Keeps ASCII letters, digits, `-` and `_`.
pub fn safe_player_name(player: &str) -> String {
    let safe: String = player
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if safe.is_empty() {
        "player".to_string()
    } else {
        safe
    }
}

/// `report_{date}_{server_id}_{player}.html`
pub fn report_file_name(date: NaiveDate, server_id: &str, player: &str) -> String {
    format!("report_{}_{}_{}.html", date.format("%Y-%m-%d"), server_id, safe_player_name(player))
}

/// `1234567` → `1 234 567`
pub fn format_int(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

pub fn format_signed(value: i64) -> String {
    if value > 0 {
        format!("+{}", format_int(value))
    } else {
        format_int(value)
    }
}

fn format_delta(delta: Option<Delta>) -> String {
    match delta {
        Some(d) => format!("{} ({} places)", format_signed(d.points), format_signed(d.rank)),
        None => "-".to_string(),
    }
}

fn delta_color(delta: Option<Delta>) -> Color {
    match delta.map(|d| d.points) {
        Some(p) if p > 0 => Color::Green,
        Some(p) if p < 0 => Color::Red,
        _ => Color::Reset,
    }
}

pub fn render_table(data: &ReportData) -> String {
    let ctx = &data.context;
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new(format!("{} / {}", ctx.universe_name, ctx.player_name))
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan),
            Cell::new("Points").add_attribute(Attribute::Bold),
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Last update").add_attribute(Attribute::Bold),
            Cell::new("24h").add_attribute(Attribute::Bold),
            Cell::new("Recap").add_attribute(Attribute::Bold),
        ]);

    for card in &data.cards {
        let (points, rank) = match &card.latest {
            Some(s) => (format_int(s.points()), s.rank().to_string()),
            None => ("-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            Cell::new(card.metric_type.label()).add_attribute(Attribute::Bold),
            Cell::new(points).set_alignment(CellAlignment::Right),
            Cell::new(rank).set_alignment(CellAlignment::Right),
            Cell::new(format_delta(card.last_delta)).fg(delta_color(card.last_delta)),
            Cell::new(format_delta(card.delta_24h)).fg(delta_color(card.delta_24h)),
            Cell::new(format_delta(card.daily_delta)).fg(delta_color(card.daily_delta)),
        ]);
    }

    let snapshot = data
        .snapshot_at
        .map_or_else(|| "no data yet".to_string(), |t| data.local(t, "%d/%m/%Y %H:%M"));
    format!(
        "{table}\nSnapshot: {snapshot} | Recap: {} -> {}\n",
        data.local(ctx.window.start, "%d/%m/%Y %H:%M"),
        data.local(ctx.window.end, "%d/%m/%Y %H:%M"),
    )
}

/// Inline SVG polyline of `points`, empty below two points.
pub fn sparkline_svg(points: &[i64]) -> String {
    const W: f64 = 220.0;
    const H: f64 = 48.0;
    if points.len() < 2 {
        return String::new();
    }
    let points = &points[points.len().saturating_sub(SPARKLINE_POINTS)..];

    let min = points.iter().copied().min().unwrap_or(0) as f64;
    let mut max = points.iter().copied().max().unwrap_or(0) as f64;
    if max == min {
        max = min + 1.0;
    }
    let last = (points.len() - 1) as f64;

    let coords = points
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let x = (i as f64 / last) * (W - 2.0) + 1.0;
            let y = (H - 2.0) - ((*v as f64 - min) / (max - min)) * (H - 2.0) + 1.0;
            format!("{x:.2},{y:.2}")
        })
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "<svg viewBox='0 0 {W} {H}' width='{W}' height='{H}' xmlns='http://www.w3.org/2000/svg' aria-hidden='true'>\
         <polyline fill='none' stroke='currentColor' stroke-width='2' points='{coords}' /></svg>"
    )
}

#[derive(Debug, Serialize)]
struct DeltaView {
    label: &'static str,
    class: &'static str,
    text: String,
}

impl DeltaView {
    fn new(label: &'static str, delta: Option<Delta>) -> Self {
        let class = match delta.map(|d| d.points) {
            Some(p) if p > 0 => "up",
            Some(p) if p < 0 => "down",
            _ => "flat",
        };
        Self {
            label,
            class,
            text: format_delta(delta),
        }
    }
}

#[derive(Debug, Serialize)]
struct CardView {
    label: &'static str,
    value: String,
    rank: String,
    ships: Option<String>,
    deltas: Vec<DeltaView>,
    sparkline: String,
    avg_move: String,
}

impl From<&MetricCard> for CardView {
    fn from(card: &MetricCard) -> Self {
        let (value, rank) = match &card.latest {
            Some(s) => (format_int(s.points()), format!("#{}", s.rank())),
            None => ("-".to_string(), String::new()),
        };
        CardView {
            label: card.metric_type.label(),
            value,
            rank,
            ships: card
                .latest
                .as_ref()
                .and_then(|s| s.payload.ships())
                .map(|n| format_int(n as i64)),
            deltas: vec![
                DeltaView::new("Last update", card.last_delta),
                DeltaView::new("24h", card.delta_24h),
                DeltaView::new("Recap", card.daily_delta),
            ],
            sparkline: sparkline_svg(&card.series),
            avg_move: format_int(card.mean_abs_delta.round() as i64),
        }
    }
}

#[derive(Debug, Serialize)]
struct MoveView {
    kind: &'static str,
    label: &'static str,
    rank: String,
    points: String,
}

#[derive(Debug, Serialize)]
struct AlertView {
    when: String,
    category: String,
}

#[derive(Debug, Serialize)]
struct ReportView {
    title: String,
    server_id: String,
    snapshot: String,
    timezone: String,
    window_start: String,
    window_end: String,
    moves: Vec<MoveView>,
    alerts: Vec<AlertView>,
    cards: Vec<CardView>,
}

pub fn render_html(data: &ReportData) -> Result<String> {
    let ctx = &data.context;
    let moves = data
        .rank_moves()
        .into_iter()
        .map(|m| MoveView {
            kind: match m.rank.signum() {
                1 => "TOP",
                -1 => "FLOP",
                _ => "MOVE",
            },
            label: m.metric_type.label(),
            rank: format_signed(m.rank),
            points: format_signed(m.points),
        })
        .collect();
    let alerts = data
        .alerts
        .iter()
        .map(|a| AlertView {
            when: data.local(a.created_at, "%d/%m/%Y %H:%M"),
            category: describe_category(&a.category),
        })
        .collect();

    let view = ReportView {
        title: format!("{} / {} / {}", ctx.universe_name, ctx.player_name, ctx.report_date.format("%d/%m/%Y")),
        server_id: ctx.server_id.clone(),
        snapshot: data
            .snapshot_at
            .map_or_else(|| "no data yet".to_string(), |t| data.local(t, "%d/%m/%Y %H:%M")),
        timezone: ctx.timezone.to_string(),
        window_start: data.local(ctx.window.start, "%d/%m/%Y %H:%M"),
        window_end: data.local(ctx.window.end, "%d/%m/%Y %H:%M"),
        moves,
        alerts,
        cards: data.cards.iter().map(CardView::from).collect(),
    };
    templates::render(REPORT_TEMPLATE, view)
}

/// Renders `data` into `out_dir` under its report file name.
pub fn write_report(out_dir: &Path, data: &ReportData) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir).map_err(Error::io("Creating", out_dir))?;
    let path = out_dir.join(data.file_name());
    let html = render_html(data)?;
    std::fs::write(&path, html).map_err(Error::io("Writing", &path))?;
    info!(path = %path.display(), "Report written");
    Ok(path)
}
