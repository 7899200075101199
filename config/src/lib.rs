//! # Configuration
//!
//! One [`Config`] value describes a single universe/player pair and everything needed to collect,
//! store and publish its statistics. It is built once at start-up and handed to every component;
//! nothing reads configuration from global state afterwards.
//!
//! Sources, lowest precedence first:
//!
//! - the embedded `default-config.yaml`
//! - the YAML file given with `--config` (or `<config_dir>/config.yaml` when present)
//! - `OGAME_STATS__*` environment variables, `__` separating nested keys
//!   (`OGAME_STATS__DISCORD__WEBHOOK_URL`)

#[macro_use]
extern crate tracing;

mod app_config;
mod sections;

use app_config::AppConfig;
pub use app_config::{
    get_config_dir,
    get_data_dir,
};
use color_eyre::Result;
use eyre::{
    bail,
    Context as _,
};
pub use sections::{
    AlertThresholds,
    AlertsConfig,
    DiscordConfig,
    HttpConfig,
    OutputConfig,
    ScheduleConfig,
    StorageConfig,
    TimezoneConfig,
    UniverseConfig,
};
use serde::Deserialize;
use std::path::{
    Path,
    PathBuf,
};

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub app_config: AppConfig,
    pub community: String,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub player_name: String,
    /// Highscore category names; empty selects every category.
    #[serde(default)]
    pub metrics: Vec<String>,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub timezone: TimezoneConfig,
    pub output: OutputConfig,
    pub discord: DiscordConfig,
    pub schedule: ScheduleConfig,
    pub alerts: AlertsConfig,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    /// Layers defaults, the config file and the environment, then resolves relative paths.
    ///
    /// An explicitly given `path` must exist; the implicit `<config_dir>/config.yaml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();

        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (config_dir.join("config.yaml"), false),
        };
        if required && !file.is_file() {
            bail!("Config not found: {}", file.display());
        }

        let builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml))
            .add_source(
                config::File::from(file.clone())
                    .format(config::FileFormat::Yaml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(app_config::PROJECT_NAME.as_str())
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Self = builder
            .build()?
            .try_deserialize()
            .wrap_err_with(|| format!("Invalid configuration in {}", file.display()))?;

        if file.is_file() {
            cfg.source = Some(file);
        }
        cfg.resolve_paths();
        debug!(source = ?cfg.source, database = %cfg.storage.database.display(), "Configuration loaded");

        Ok(cfg)
    }

    /// The file this configuration was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        match self.source.as_deref().and_then(Path::parent) {
            Some(parent) => parent.to_path_buf(),
            None => self.app_config.data_dir.clone(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    fn resolve_paths(&mut self) {
        let base = self.base_dir();
        let resolve = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { base.join(p) };
        self.storage.database = resolve(&self.storage.database);
        self.output.out_dir = resolve(&self.output.out_dir);
        self.output.publish_dir = resolve(&self.output.publish_dir);
    }

    /// Checks the settings every command relies on.
    pub fn validate(&self) -> Result<()> {
        if self.player_name.trim().is_empty() {
            bail!("player_name is required");
        }
        if !(1..=24 * 60).contains(&self.schedule.collect_minutes) {
            bail!("schedule.collect_minutes must be in 1..=1440, got {}", self.schedule.collect_minutes);
        }
        let thresholds = &self.alerts.thresholds;
        if thresholds.rank_jump_1h < 1 || thresholds.rank_drop_1h < 1 {
            bail!("alerts.thresholds rank limits must be at least 1");
        }
        if !(thresholds.pct_change_24h > 0.0 && thresholds.lost_spike_factor > 0.0) {
            bail!("alerts.thresholds pct_change_24h and lost_spike_factor must be positive");
        }
        let latest = self.output.latest_filename.trim();
        if latest.is_empty() || latest.contains('/') || latest.contains('\\') {
            bail!("output.latest_filename must be a file name, got {latest:?}");
        }
        if self.universe.server_id.trim().is_empty() && self.universe.base_url.is_none() {
            bail!("universe.server_id is required (use list-universes to find it)");
        }
        Ok(())
    }

    /// Community tag, trimmed and lower-cased.
    pub fn community(&self) -> String {
        self.community.trim().to_lowercase()
    }
}

/// Writes the commented example configuration to `path`.
///
/// An existing file is kept unless `force` is set, so running `init` twice is harmless.
pub fn write_example_config(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        info!(path = %path.display(), "Keeping existing configuration");
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(path, DEFAULT_CONFIG).wrap_err_with(|| format!("Failed to write config to {:?}", path))?;
    info!(path = %path.display(), "Wrote example configuration");
    Ok(path.to_path_buf())
}
