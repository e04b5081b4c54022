//! Dashboard stats: one-shot or polled on the shared refresh timer.

use chrono::Utc;
use serde::Serialize;

use dashwire_core::{
    DashboardClient, DashboardStats, RegisterOptions, format_start_time, format_uptime,
};

use crate::cli::{GlobalOpts, OutputFormat, StatsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

const SUBSCRIPTION_KEY: &str = "cli:stats";

#[derive(Debug, Serialize)]
struct StatsView {
    memory_used: u64,
    memory_total: u64,
    memory_percent: f64,
    start_time: i64,
    started_at: String,
    uptime: String,
}

impl From<&DashboardStats> for StatsView {
    fn from(stats: &DashboardStats) -> Self {
        Self {
            memory_used: stats.memory_used,
            memory_total: stats.memory_total,
            memory_percent: stats.memory_percent,
            start_time: stats.start_time,
            started_at: format_start_time(stats.start_time),
            uptime: format_uptime(stats.start_time, Utc::now()),
        }
    }
}

fn stats_detail(view: &StatsView) -> String {
    output::detail_lines(&[
        (
            "Memory",
            format!(
                "{} / {} ({:.1}%)",
                output::format_bytes(view.memory_used),
                output::format_bytes(view.memory_total),
                view.memory_percent
            ),
        ),
        ("Started", view.started_at.clone()),
        ("Uptime", view.uptime.clone()),
    ])
}

fn render(format: &OutputFormat, stats: &DashboardStats) -> String {
    output::render_single(format, &StatsView::from(stats), stats_detail)
}

pub async fn handle(
    client: &DashboardClient,
    args: StatsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_session(client)?;

    if !args.watch {
        let stats = client.refresh_dashboard().await?;
        output::print_output(&render(&global.output, &stats), global.quiet);
        return Ok(());
    }

    watch(client, args.interval, global).await
}

async fn watch(
    client: &DashboardClient,
    interval: Option<f64>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let scheduler = client.refresh();
    if let Some(seconds) = interval {
        scheduler.set_interval_secs(seconds);
    }

    let toasts = util::spawn_toast_printer(client.notifications(), output::should_color(&global.color));
    let persister = util::spawn_session_persister(client);

    if !scheduler.is_enabled() {
        client
            .notifications()
            .warning("periodic refresh is disabled, run `dashwire config enable`");
    }

    let tick_client = client.clone();
    let format = global.output.clone();
    let quiet = global.quiet;
    let subscription = scheduler.register(
        SUBSCRIPTION_KEY,
        move || {
            let client = tick_client.clone();
            let format = format.clone();
            async move {
                match client.refresh_dashboard().await {
                    Ok(stats) => {
                        output::print_output(&render(&format, &stats), quiet);
                        Ok(())
                    }
                    Err(e) => {
                        client.notifications().error(e.to_string());
                        Err(e.into())
                    }
                }
            }
        },
        RegisterOptions { immediate: true },
    );
    scheduler.start();

    let result = util::wait_for_shutdown(client).await;

    if let Some(subscription) = subscription {
        subscription.unsubscribe();
    }
    scheduler.shutdown();
    persister.abort();
    toasts.abort();
    result
}
