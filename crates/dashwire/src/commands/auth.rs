//! Session command handlers: login, logout, status.

use secrecy::SecretString;
use serde::Serialize;

use dashwire_core::DashboardClient;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::error::CliError;
use crate::output;

pub async fn login(
    client: &DashboardClient,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let key = match args.auth_key {
        Some(key) => key,
        None => rpassword::prompt_password("Auth key: ")?,
    };
    if key.trim().is_empty() {
        return Err(CliError::Validation {
            field: "auth_key".into(),
            reason: "auth key cannot be empty".into(),
        });
    }

    client.auth().login(&SecretString::from(key)).await?;
    dashwire_config::save_session(&client.auth().state())?;

    output::print_output(
        &format!("Logged in to {}", client.config().server),
        global.quiet,
    );
    Ok(())
}

pub async fn logout(client: &DashboardClient, global: &GlobalOpts) -> Result<(), CliError> {
    if !client.auth().is_authenticated() {
        dashwire_config::clear_session()?;
        output::print_output("Not logged in", global.quiet);
        return Ok(());
    }

    client.auth().logout().await;
    dashwire_config::clear_session()?;
    output::print_output("Logged out", global.quiet);
    Ok(())
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatusView {
    server: String,
    api_base: String,
    session: &'static str,
    refresh_enabled: bool,
    refresh_interval_secs: u64,
}

fn status_detail(view: &StatusView) -> String {
    output::detail_lines(&[
        ("Server", view.server.clone()),
        ("API base", view.api_base.clone()),
        ("Session", view.session.to_owned()),
        (
            "Refresh",
            if view.refresh_enabled {
                format!("every {}s", view.refresh_interval_secs)
            } else {
                "disabled".to_owned()
            },
        ),
    ])
}

/// Show config and, when a session is stored, ask the server about it.
pub async fn status(client: &DashboardClient, global: &GlobalOpts) -> Result<(), CliError> {
    let session = if client.auth().is_authenticated() {
        if client.auth().validate_session().await {
            "active"
        } else {
            dashwire_config::clear_session()?;
            "expired"
        }
    } else {
        "none"
    };

    let api_base = client
        .gateway()
        .build_url("/", None)
        .map_or_else(|_| "/api".to_owned(), |u| u.as_str().trim_end_matches('/').to_owned());
    let view = StatusView {
        server: client.config().server.to_string(),
        api_base,
        session,
        refresh_enabled: client.refresh().is_enabled(),
        refresh_interval_secs: client.refresh().interval_secs(),
    };

    output::print_output(
        &output::render_single(&global.output, &view, status_detail),
        global.quiet,
    );
    Ok(())
}
