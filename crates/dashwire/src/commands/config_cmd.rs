//! Config subcommand handlers.

use dashwire_core::normalize_interval_secs;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

fn show(cfg: &Config, format: &OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            toml::to_string_pretty(cfg).map_err(|e| CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            })
        }
        other => Ok(output::render_single(other, cfg, |_| String::new())),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::apply_overrides(config::load_config()?, global);
            output::print_output(&show(&cfg, &global.output)?, global.quiet);
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
        }

        ConfigCommand::SetServer { url } => {
            let parsed: url::Url = url.parse().map_err(|_| CliError::Validation {
                field: "server".into(),
                reason: format!("invalid URL: {url}"),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CliError::Validation {
                    field: "server".into(),
                    reason: format!("expected an http(s) URL, got '{url}'"),
                });
            }

            let mut cfg = config::load_config()?;
            cfg.server = url;
            config::save_config(&cfg)?;
            // A session belongs to the server that issued it.
            dashwire_config::clear_session()?;
            output::print_output(&format!("Server set to {}", cfg.server), global.quiet);
        }

        ConfigCommand::SetInterval { seconds } => {
            let normalized = normalize_interval_secs(seconds);
            let mut cfg = config::load_config()?;
            cfg.refresh.interval_seconds = normalized;
            config::save_config(&cfg)?;
            output::print_output(
                &format!("Refresh interval set to {normalized}s"),
                global.quiet,
            );
        }

        toggle @ (ConfigCommand::Enable | ConfigCommand::Disable) => {
            let enabled = matches!(toggle, ConfigCommand::Enable);
            let mut cfg = config::load_config()?;
            cfg.refresh.enabled = enabled;
            config::save_config(&cfg)?;
            output::print_output(
                if enabled {
                    "Periodic refresh enabled"
                } else {
                    "Periodic refresh disabled"
                },
                global.quiet,
            );
        }
    }
    Ok(())
}
