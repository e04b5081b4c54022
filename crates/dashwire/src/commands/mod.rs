//! Command dispatch: bridges CLI args -> core client -> output formatting.

pub mod auth;
pub mod config_cmd;
pub mod logs;
pub mod stats;
pub mod util;

use dashwire_core::DashboardClient;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// In-app view a command stands for, used as the login return target.
pub fn view_for(cmd: &Command) -> &'static str {
    match cmd {
        Command::Logs(_) => "/logs",
        _ => "/dashboard",
    }
}

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &DashboardClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => auth::login(client, args, global).await,
        Command::Logout => auth::logout(client, global).await,
        Command::Status => auth::status(client, global).await,
        Command::Stats(args) => stats::handle(client, args, global).await,
        Command::Logs(args) => logs::handle(client, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
