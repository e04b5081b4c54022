//! CLI configuration -- thin wrapper around `dashwire_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--server, --api-base, --insecure, --timeout).

use dashwire_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use dashwire_config::{Config, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Apply CLI flag overrides on top of the loaded config.
pub fn apply_overrides(mut cfg: Config, global: &GlobalOpts) -> Config {
    if let Some(ref server) = global.server {
        cfg.server.clone_from(server);
    }
    if let Some(ref base) = global.api_base {
        cfg.api_base = Some(base.clone());
    }
    if global.insecure {
        cfg.defaults.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.defaults.timeout = timeout;
    }
    cfg
}

/// Load config + persisted session and translate into a `ClientConfig`.
pub fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = apply_overrides(load_config()?, global);
    let session = dashwire_config::load_session()?;
    Ok(dashwire_config::to_client_config(&cfg, session.as_ref())?)
}
