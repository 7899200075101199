//! # Daily recap
//!
//! Turns a [`ReportData`] into the Discord embed posted once a day.

use crate::{
    aggregate::Delta,
    publish::join_public_url,
    render::{
        format_signed,
        ReportData,
        MAIN_METRICS,
    },
};
use ogame_stats_core::MetricType;
use serde_json::{
    json,
    Value,
};
use url::Url;

pub const EMBED_COLOR: u32 = 0x2E8B57;
const FOOTER: &str = "Public API only • no login • no botting";
const MILITARY_DETAIL: [MetricType; 3] = [
    MetricType::MilitaryBuilt,
    MetricType::MilitaryDestroyed,
    MetricType::MilitaryLost,
];

/// Public links to a published report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLinks {
    pub clean: String,
    pub neon: String,
    pub dated: Option<String>,
}

impl ReportLinks {
    pub fn new(public_base_url: &Url, latest_filename: &str, report_file_name: &str, keep_history: bool) -> Self {
        let latest = join_public_url(Some(public_base_url), latest_filename);
        Self {
            clean: format!("{latest}?theme=clean"),
            neon: format!("{latest}?theme=neon"),
            dated: keep_history.then(|| join_public_url(Some(public_base_url), report_file_name)),
        }
    }

    fn field_value(&self) -> String {
        let mut value = format!("Clean: {}\nNeon: {}", self.clean, self.neon);
        if let Some(dated) = &self.dated {
            value.push_str(&format!("\nDated: {dated}"));
        }
        value
    }
}

fn field(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Value {
    json!({
        "name": name.into(),
        "value": value.into(),
        "inline": inline,
    })
}

fn daily(data: &ReportData, metric_type: MetricType) -> Option<Delta> {
    data.card_for(metric_type).and_then(|c| c.daily_delta)
}

fn short_label(metric_type: MetricType) -> &'static str {
    match metric_type {
        MetricType::Global => "Global",
        MetricType::Economy => "Eco",
        MetricType::Research => "Research",
        MetricType::Military => "Military",
        MetricType::MilitaryBuilt => "Built",
        MetricType::MilitaryDestroyed => "Destroyed",
        MetricType::MilitaryLost => "Lost",
        MetricType::Honor => "Honor",
    }
}

/// One-line verdict on the day's global progress.
fn mood(global_points: i64) -> &'static str {
    match global_points {
        p if p >= 100_000 => "Massive day.",
        p if p > 0 => "Steady growth.",
        0 => "Quiet day.",
        _ => "Rough day.",
    }
}

/// Builds the recap embed. With `links`, the report is referenced by URL; the caller attaches the
/// HTML file otherwise.
pub fn recap_payload(data: &ReportData, links: Option<&ReportLinks>) -> Value {
    let ctx = &data.context;
    let tz = ctx.timezone;

    let points = |m| daily(data, m).map_or(0, |d| d.points);
    let ranks = |m| daily(data, m).map_or(0, |d| d.rank);

    let summary = MAIN_METRICS
        .iter()
        .map(|m| format!("{} {}", short_label(*m), format_signed(points(*m))))
        .collect::<Vec<_>>()
        .join(" | ");

    let mut fields = vec![field(
        "Summary",
        format!("{summary}\n{}", mood(points(MetricType::Global))),
        false,
    )];
    for m in MAIN_METRICS {
        fields.push(field(
            m.label(),
            format!("Points: {}\nRank: {}", format_signed(points(m)), format_signed(ranks(m))),
            true,
        ));
    }

    let detail: Vec<String> = MILITARY_DETAIL
        .iter()
        .filter_map(|m| daily(data, *m).map(|d| format!("{}: {}", short_label(*m), format_signed(d.points))))
        .collect();
    if !detail.is_empty() {
        fields.push(field("Military detail", detail.join(" • "), false));
    }

    let moves = data.rank_moves();
    let best = moves.iter().max_by_key(|m| m.rank);
    let worst = moves.iter().min_by_key(|m| m.rank);
    let top_flop = match (best, worst) {
        (Some(best), Some(worst)) => format!(
            "TOP: {} ({} places)\nFLOP: {} ({} places)",
            best.metric_type.label(),
            format_signed(best.rank),
            worst.metric_type.label(),
            format_signed(worst.rank),
        ),
        _ => "Not enough data yet.".to_string(),
    };
    fields.push(field("TOP / FLOP (last update)", top_flop, false));

    if let Some(links) = links {
        fields.push(field("Report", links.field_value(), false));
    }

    let snapshot = data
        .snapshot_at
        .map_or_else(|| "--:--".to_string(), |t| t.with_timezone(&tz).format("%H:%M").to_string());
    let period = format!(
        "{} → {}",
        ctx.window.start.with_timezone(&tz).format("%d/%m/%Y %H:%M"),
        ctx.window.end.with_timezone(&tz).format("%d/%m/%Y %H:%M"),
    );

    json!({
        "embeds": [{
            "title": format!(
                "OGame • {} • Recap of {} • {}",
                ctx.universe_name,
                ctx.report_date.format("%d/%m/%Y"),
                ctx.player_name
            ),
            "description": format!("Snapshot: {snapshot} • Period: {period}"),
            "color": EMBED_COLOR,
            "fields": fields,
            "footer": { "text": FOOTER },
        }]
    })
}
