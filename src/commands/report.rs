use super::Context;
use chrono::{
    DateTime,
    Duration,
    NaiveDate,
    Utc,
};
use color_eyre::Result;
use ogame_stats_config::Config;
use ogame_stats_core::{
    Error as CoreError,
    RenderState,
    Store,
};
use ogame_stats_report::{
    find_latest_report,
    publish_report,
    recap_payload,
    recap_window,
    render_table,
    write_report,
    Delivery,
    DiscordWebhook,
    PublishResult,
    ReportContext,
    ReportData,
    ReportLinks,
};
use std::path::{
    Path,
    PathBuf,
};

const PLAYER_SUGGESTIONS: usize = 5;
/// The report lists the alerts of this many days.
const ALERT_DAYS: i64 = 7;
const REPORT_ALERTS: u64 = 50;

/// Report data for `date`, read from the store only. The player must have been collected once.
async fn gather(ctx: &Context, date: NaiveDate, now: DateTime<Utc>) -> Result<ReportData> {
    let server_id = ctx.server_id()?;
    let player_name = ctx.config.player_name.trim();

    let universe_name = ctx
        .store
        .universes()
        .get(&server_id)
        .await?
        .map_or_else(|| server_id.clone(), |u| u.name);
    let player = match ctx.store.players().find_by_name(&server_id, player_name).await? {
        Some(player) => player,
        None => {
            let suggestions = ctx
                .store
                .players()
                .suggestions(&server_id, player_name, PLAYER_SUGGESTIONS)
                .await?;
            return Err(CoreError::PlayerNotFound {
                name: player_name.to_string(),
                suggestions,
            }
            .into());
        }
    };

    let timezone = ctx.config.timezone.report;
    let window = recap_window(date, ctx.config.schedule.recap_time, timezone)?;
    // Past reports stop at their own window.
    let until = if date == ctx.today(now) { now } else { window.end.min(now) };

    let alerts = ctx
        .store
        .alerts()
        .since(&server_id, player.player_id, until - Duration::days(ALERT_DAYS), REPORT_ALERTS)
        .await?;
    let context = ReportContext {
        server_id,
        universe_name,
        player_name: player.name,
        player_id: player.player_id,
        report_date: date,
        window,
        timezone,
    };
    Ok(ReportData::gather(&ctx.store, context, until).await?.with_alerts(alerts))
}

/// Writes the report and remembers it as the one to publish.
async fn render_report(ctx: &Context, date: NaiveDate, now: DateTime<Utc>) -> Result<(ReportData, PathBuf)> {
    let data = gather(ctx, date, now).await?;
    let path = write_report(&ctx.config.output.out_dir, &data)?;
    let state = RenderState {
        last_report_path: path.clone(),
        last_report_name: data.file_name(),
        date,
    };
    ctx.store.jobs().set_last_render(&state, now).await?;
    Ok((data, path))
}

/// Writes the HTML report for `date` (today by default) and prints it as a table.
pub async fn render(ctx: &Context, date: Option<NaiveDate>) -> Result<PathBuf> {
    let now = Utc::now();
    let date = date.unwrap_or_else(|| ctx.today(now));
    let (data, path) = render_report(ctx, date, now).await?;
    print!("{}", render_table(&data));
    println!("Report written to {}", path.display());
    Ok(path)
}

/// The last rendered report while it still exists, else the newest one in `out_dir`.
fn report_to_publish(last_render: Option<RenderState>, out_dir: &Path) -> Result<PathBuf> {
    match last_render {
        Some(state) if state.last_report_path.is_file() => Ok(state.last_report_path),
        Some(state) => {
            debug!(path = %state.last_report_path.display(), "Last rendered report is gone");
            Ok(find_latest_report(out_dir)?)
        }
        None => Ok(find_latest_report(out_dir)?),
    }
}

async fn last_render(config: &Config) -> Result<Option<RenderState>> {
    let database = &config.storage.database;
    if !database.is_file() {
        return Ok(None);
    }
    let store = Store::open(database).await?;
    Ok(store.jobs().last_render().await?)
}

/// Publishes `report`, or the last rendered report.
pub async fn publish(config: &Config, report: Option<&Path>, generate_index: bool) -> Result<PublishResult> {
    let output = &config.output;
    let report = match report {
        Some(path) => path.to_path_buf(),
        None => report_to_publish(last_render(config).await?, &output.out_dir)?,
    };
    let result = publish_report(
        &report,
        &output.publish_dir,
        &output.latest_filename,
        output.keep_history,
        generate_index,
    )?;
    println!("Published {} as {}", report.display(), result.latest.display());
    Ok(result)
}

/// Renders the report for `date` and posts the recap.
///
/// With a public base URL the report is published and linked; otherwise it is attached.
pub async fn post_recap(ctx: &Context, date: Option<NaiveDate>) -> Result<Delivery> {
    let now = Utc::now();
    let date = date.unwrap_or_else(|| ctx.today(now));
    let (data, path) = render_report(ctx, date, now).await?;
    let output = &ctx.config.output;

    let (links, attachment) = match &output.public_base_url {
        Some(base) => {
            if let Err(e) = publish_report(&path, &output.publish_dir, &output.latest_filename, output.keep_history, true)
            {
                error!(error = %e, "Publishing failed, posting links anyway");
            }
            let links = ReportLinks::new(base, &output.latest_filename, &data.file_name(), output.keep_history);
            (Some(links), None)
        }
        None => (None, Some(path.as_path())),
    };

    let payload = recap_payload(&data, links.as_ref());
    let delivery = DiscordWebhook::from_config(&ctx.config.discord, ctx.http.clone())
        .send(payload, attachment)
        .await?;
    ctx.store.jobs().set_last_recap(date, now).await?;
    info!(%date, ?delivery, "Recap posted");
    Ok(delivery)
}
