use super::{
    post_recap,
    Context,
};
use crate::schedule::{
    Schedule,
    Scheduler,
};
use chrono::{
    DateTime,
    Duration,
    Utc,
};
use color_eyre::Result;
use ogame_stats_core::{
    Collector,
    Orchestrator,
    RunSummary,
    Store,
};
use ogame_stats_report::{
    alerts,
    AlertSubject,
    DiscordWebhook,
};

/// A scheduler that already knows the last recap posted, by this process or an earlier one.
async fn restore_scheduler(store: &Store, schedule: Schedule) -> Result<Scheduler> {
    let mut scheduler = Scheduler::new(schedule);
    if let Some(date) = store.jobs().last_recap().await? {
        debug!(%date, "Last recap restored");
        scheduler.recapped(date);
    }
    Ok(scheduler)
}

/// Checks the fresh snapshots and posts what fired. Returns the categories sent.
async fn send_alerts(ctx: &Context, summary: &RunSummary, now: DateTime<Utc>) -> Result<Vec<String>> {
    let config = &ctx.config.alerts;
    let raised = alerts::evaluate(&ctx.store, &summary.server_id, summary.player_id, now, &config.thresholds).await?;
    if raised.is_empty() {
        return Ok(Vec::new());
    }
    let subject = AlertSubject {
        server_id: summary.server_id.clone(),
        player_id: summary.player_id,
        player_name: summary.player_name.clone(),
        universe_name: summary.universe_name.clone(),
    };
    let webhook = DiscordWebhook::from_config(&ctx.config.discord, ctx.http.clone());
    let cooldown = Duration::minutes(i64::from(config.cooldown_minutes));
    Ok(alerts::dispatch(&ctx.store, &webhook, &subject, &raised, cooldown, now).await?)
}

/// Collects on every boundary and posts the recap once a day, until Ctrl-C.
///
/// A failed job is logged and the loop carries on.
pub async fn run(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let schedule = Schedule::new(
        config.schedule.collect_minutes,
        config.schedule.recap_time,
        config.timezone.report,
    );
    let mut scheduler = restore_scheduler(&ctx.store, schedule).await?;
    let mut orchestrator = Orchestrator::new(config.clone(), ctx.store.clone(), ctx.http.clone());

    let now = Utc::now();
    info!(
        collect_minutes = config.schedule.collect_minutes,
        recap_time = %config.schedule.recap_time.format("%H:%M"),
        timezone = %config.timezone.report,
        alerts = config.alerts.enabled,
        next_wake = %scheduler.next_wake(now),
        "Scheduler started"
    );

    // One signal future for the whole loop, so Ctrl-C during a job is seen at the next select.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let now = Utc::now();
        let due = scheduler.due(now);

        // Collect first so the recap sees the fresh snapshot.
        if let Some(boundary) = due.collect {
            match orchestrator.collect(now).await {
                Ok(()) => {
                    debug!(%boundary, "Scheduled collection done");
                    if let Some(summary) = orchestrator.last_summary().filter(|_| config.alerts.enabled) {
                        match send_alerts(ctx, summary, now).await {
                            Ok(sent) if !sent.is_empty() => info!(?sent, "Alerts sent"),
                            Ok(_) => {}
                            Err(e) => error!(error = ?e, "Alert check failed"),
                        }
                    }
                }
                Err(e) => error!(%boundary, error = %e, "Scheduled collection failed"),
            }
            scheduler.collected(boundary);
        }

        if let Some(date) = due.recap {
            match ctx.store.jobs().last_recap().await {
                Ok(Some(last)) if last == date => {
                    debug!(%date, "Recap already posted");
                    scheduler.recapped(date);
                }
                _ => match post_recap(ctx, Some(date)).await {
                    Ok(_) => scheduler.recapped(date),
                    Err(e) => error!(%date, error = ?e, "Recap failed, retrying while still due"),
                },
            }
        }

        let pause = scheduler.sleep_for(Utc::now());
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping scheduler");
                return Ok(());
            }
        }
    }
}
