use clap::Parser;
use color_eyre::Result;
use ogame_stats::{
    exit_code,
    init_errors,
    init_logging,
    App,
    Args,
};
use ogame_stats_config::get_data_dir;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_errors()?;
    let args = Args::parse();
    init_logging(args.verbose, &get_data_dir())?;

    match App::new(args)?.run().await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(report) => {
            eprintln!("Error: {report:?}");
            Ok(ExitCode::from(exit_code(&report)))
        }
    }
}
