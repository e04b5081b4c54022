//! Shared helpers for command handlers.

use std::sync::Mutex;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use dashwire_core::{DashboardClient, Navigator, Notifications};

use crate::error::CliError;
use crate::output;

// ── Navigator ────────────────────────────────────────────────────────

/// Terminal stand-in for the dashboard's router.
///
/// The "location" is the view a command shows (`/dashboard`, `/logs`). A
/// login redirect cannot move the user anywhere, so it is reported instead.
#[derive(Debug)]
pub struct TerminalNavigator {
    location: Mutex<String>,
}

impl TerminalNavigator {
    pub fn new(view: &str) -> Self {
        Self {
            location: Mutex::new(view.to_owned()),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> String {
        self.location.lock().expect("navigator lock poisoned").clone()
    }

    fn replace(&self, target: &str) {
        debug!(%target, "login redirect requested");
        warn!("session expired, log in again with `dashwire login`");
        *self.location.lock().expect("navigator lock poisoned") = target.to_owned();
    }
}

// ── Session helpers ──────────────────────────────────────────────────

/// Fail early when there is no stored session.
pub fn require_session(client: &DashboardClient) -> Result<(), CliError> {
    if client.auth().is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotLoggedIn)
    }
}

/// Mirror auth state changes into the session file until aborted.
pub fn spawn_session_persister(client: &DashboardClient) -> JoinHandle<()> {
    let mut rx = client.auth().subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            let result = if state.is_authenticated {
                dashwire_config::save_session(&state)
            } else {
                dashwire_config::clear_session()
            };
            if let Err(e) = result {
                warn!(error = %e, "failed to persist session");
            }
        }
    })
}

/// Print each new toast to stderr until aborted.
pub fn spawn_toast_printer(notifications: &Notifications, color: bool) -> JoinHandle<()> {
    let mut rx = notifications.subscribe();
    tokio::spawn(async move {
        let mut last_seen = 0;
        while rx.changed().await.is_ok() {
            let fresh: Vec<_> = rx
                .borrow_and_update()
                .iter()
                .filter(|t| t.id > last_seen)
                .cloned()
                .collect();
            for toast in fresh {
                last_seen = toast.id;
                eprintln!("{}", output::toast_line(&toast, color));
            }
        }
    })
}

/// Block until Ctrl-C, or fail once the session is lost.
pub async fn wait_for_shutdown(client: &DashboardClient) -> Result<(), CliError> {
    let mut auth = client.auth().subscribe();
    loop {
        if !auth.borrow_and_update().is_authenticated {
            return Err(CliError::SessionExpired);
        }
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                return Ok(());
            }
            changed = auth.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
