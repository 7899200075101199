use crate::{
    args::{
        Args,
        Command,
    },
    commands::{
        self,
        Context,
    },
};
use color_eyre::Result;
use ogame_stats_config::{
    get_config_dir,
    write_example_config,
    Config,
};
use std::path::Path;

pub struct App {
    args: Args,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        Ok(Self { args })
    }

    pub async fn run(self) -> Result<()> {
        let config_path = self.args.config.as_deref();

        match &self.args.command {
            Command::Init { force } => init(config_path, *force),
            Command::ListUniverses { community } => {
                commands::list_universes(&Config::load(config_path)?, community.as_deref()).await
            }
            Command::Publish { report, no_index } => {
                commands::publish(&Config::load(config_path)?, report.as_deref(), !no_index)
                    .await
                    .map(|_| ())
            }
            Command::Collect { json } => commands::collect(&open(config_path).await?, *json).await,
            Command::Render { date } => commands::render(&open(config_path).await?, *date).await.map(|_| ()),
            Command::PostRecap { date } => commands::post_recap(&open(config_path).await?, *date).await.map(|_| ()),
            Command::Run => commands::run(&open(config_path).await?).await,
            Command::History { metric, days, json } => {
                commands::history(&open(config_path).await?, *metric, *days, *json).await
            }
        }
    }
}

fn init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| get_config_dir().join("config.yaml"));
    let path = write_example_config(&path, force)?;
    println!("Configuration: {}", path.display());
    Ok(())
}

async fn open(config_path: Option<&Path>) -> Result<Context> {
    Context::open(Config::load(config_path)?).await
}
