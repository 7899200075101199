use super::Context;
use chrono::{
    Duration,
    Utc,
};
use color_eyre::Result;
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
    MetricType,
    SnapshotStore,
};
use ogame_stats_report::render::format_int;

/// Prints the snapshots of `metric_type` stored over the last `days` days, oldest first.
pub async fn history(ctx: &Context, metric_type: MetricType, days: u32, json: bool) -> Result<()> {
    let server_id = ctx.server_id()?;
    let Some(player) = ctx.store.players().find_by_name(&server_id, &ctx.config.player_name).await? else {
        eyre::bail!("Player {:?} has not been collected on {server_id} yet", ctx.config.player_name);
    };

    let to = Utc::now();
    let from = to - Duration::days(i64::from(days));
    let snapshots = ctx
        .store
        .query_range(&server_id, player.player_id, metric_type, from, to)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    let tz = ctx.config.timezone.report;
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new(format!("{} / {}", metric_type.label(), player.name))
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan),
            Cell::new("Points").add_attribute(Attribute::Bold),
            Cell::new("Rank").add_attribute(Attribute::Bold),
        ]);
    for snapshot in &snapshots {
        table.add_row(vec![
            Cell::new(snapshot.timestamp.with_timezone(&tz).format("%d/%m/%Y %H:%M")),
            Cell::new(format_int(snapshot.points())).set_alignment(CellAlignment::Right),
            Cell::new(snapshot.rank()).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
    println!("{} snapshot(s) since {}", snapshots.len(), from.with_timezone(&tz).format("%d/%m/%Y %H:%M"));
    Ok(())
}
