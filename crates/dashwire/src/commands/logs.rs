//! Log history and the live log stream.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use dashwire_core::{DashboardClient, LogRecord};

use crate::cli::{GlobalOpts, LogsArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&LogRecord> for LogRow {
    fn from(record: &LogRecord) -> Self {
        Self {
            time: record.time.clone(),
            level: record.level.to_ascii_uppercase(),
            message: record.display_message(),
        }
    }
}

/// Records printed one per line while following.
#[derive(Serialize)]
#[serde(transparent)]
struct StreamedRecord<'a>(&'a LogRecord);

pub async fn handle(
    client: &DashboardClient,
    args: LogsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_session(client)?;
    let color = output::should_color(&global.color);

    let mut history = client.log_history().await?;
    if let Some(tail) = args.tail {
        let skip = history.len().saturating_sub(tail);
        history.drain(..skip);
    }

    let rendered = output::render_list(&global.output, &history, |r: &LogRecord| LogRow::from(r), |r| {
        output::log_line(r, color)
    });
    output::print_output(&rendered, global.quiet);

    if !args.follow {
        return Ok(());
    }

    follow(client, global, color).await
}

async fn follow(client: &DashboardClient, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let format = global.output.clone();
    let quiet = global.quiet;
    let stream = client.log_stream(Some(Arc::new(move |record: &LogRecord| {
        let line = match format {
            OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
                output::render_json(&StreamedRecord(record), true)
            }
            OutputFormat::Table | OutputFormat::Plain => output::log_line(record, color),
        };
        output::print_output(&line, quiet);
    })))?;

    let persister = util::spawn_session_persister(client);
    let mut state = stream.subscribe_state();
    let state_logger = tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            debug!(state = %current, "log stream state");
        }
    });

    stream.connect();
    let result = util::wait_for_shutdown(client).await;

    stream.disconnect();
    state_logger.abort();
    persister.abort();
    result
}
