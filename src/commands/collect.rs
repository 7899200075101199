use super::Context;
use chrono::Utc;
use color_eyre::Result;
use ogame_stats_core::{
    Collector,
    Orchestrator,
};

pub async fn collect(ctx: &Context, json: bool) -> Result<()> {
    let mut orchestrator = Orchestrator::new(ctx.config.clone(), ctx.store.clone(), ctx.http.clone());
    orchestrator.collect(Utc::now()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&orchestrator.summary())?);
    } else {
        print!("{}", orchestrator.format());
    }
    Ok(())
}
