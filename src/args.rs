use chrono::NaiveDate;
use clap::{
    Parser,
    Subcommand,
};
use ogame_stats_core::MetricType;
use std::path::PathBuf;

/// Polls the public OGame statistics API and reports on one player's progress.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log at debug level (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// YAML configuration file. Defaults to `config.yaml` in the config directory when present.
    #[arg(long, global = true, env = "OGAME_STATS_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write an example configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// List the universes of a community.
    ListUniverses {
        /// Community tag (fr, de, en, ...). Defaults to the configured one.
        #[arg(long)]
        community: Option<String>,
    },

    /// Run one collection and print its summary.
    Collect {
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render the HTML report and print it as a table.
    Render {
        /// Report date (YYYY-MM-DD), today in the report timezone by default.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Copy a rendered report into the publish directory.
    Publish {
        /// Report to publish. Defaults to the newest one in the output directory.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Do not regenerate `index.html`.
        #[arg(long)]
        no_index: bool,
    },

    /// Render today's report and post the daily recap to Discord.
    PostRecap {
        /// Recap date (YYYY-MM-DD), today in the report timezone by default.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Collect and post recaps on schedule until interrupted.
    Run,

    /// Print the stored history of one metric type.
    History {
        /// Metric type (global, economy, research, military, military_lost, ...).
        #[arg(long)]
        metric: MetricType,

        /// How many days back to show.
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Print the snapshots as JSON.
        #[arg(long)]
        json: bool,
    },
}
