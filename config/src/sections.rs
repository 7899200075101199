use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{
    de,
    Deserialize,
    Deserializer,
};
use std::{
    path::PathBuf,
    time::Duration,
};
use url::Url;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UniverseConfig {
    #[serde(default)]
    pub server_id: String,
    #[serde(default, deserialize_with = "optional_url")]
    pub base_url: Option<Url>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HttpConfig {
    /// Applied to every request; a request that exceeds it counts as failed.
    #[serde(deserialize_with = "human_duration")]
    pub timeout: Duration,
    pub user_agent: String,
    pub lobby_url: Url,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub database: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TimezoneConfig {
    pub source: Tz,
    pub report: Tz,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OutputConfig {
    pub out_dir: PathBuf,
    pub publish_dir: PathBuf,
    #[serde(default, deserialize_with = "optional_url")]
    pub public_base_url: Option<Url>,
    pub latest_filename: String,
    #[serde(default)]
    pub keep_history: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DiscordConfig {
    #[serde(default, deserialize_with = "optional_url")]
    pub webhook_url: Option<Url>,
    pub username: String,
    #[serde(default, deserialize_with = "optional_url")]
    pub avatar_url: Option<Url>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScheduleConfig {
    pub collect_minutes: u32,
    #[serde(deserialize_with = "hh_mm")]
    pub recap_time: NaiveTime,
}

/// Limits past which a collection raises an alert.
#[derive(Clone, Debug, Deserialize)]
pub struct AlertThresholds {
    /// Places gained at one update.
    pub rank_jump_1h: i64,
    /// Places lost at one update.
    pub rank_drop_1h: i64,
    /// Points moved over 24 hours, as a fraction of the points 24 hours earlier.
    pub pct_change_24h: f64,
    /// Multiple of the weekly mean move that makes a `military_lost` update a spike.
    pub lost_spike_factor: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            rank_jump_1h: 25,
            rank_drop_1h: 25,
            pct_change_24h: 0.006,
            lost_spike_factor: 2.5,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// One alert per category at most this often.
    pub cooldown_minutes: u32,
    #[serde(default)]
    pub thresholds: AlertThresholds,
}

fn optional_url<'de, D>(deserializer: D) -> Result<Option<Url>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Url::parse(value)
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid URL '{value}': {e}"))),
    }
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(|e| de::Error::custom(format!("invalid duration '{raw}': {e}")))
}

pub(crate) fn parse_hh_mm(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| format!("invalid time (expected HH:MM): {raw:?}"))
}

fn hh_mm<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_hh_mm(&raw).map_err(de::Error::custom)
}
