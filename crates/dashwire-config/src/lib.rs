//! Shared configuration for the dashwire CLI.
//!
//! TOML settings layered with `DASHWIRE_*` environment variables, the
//! persisted session in a separate `session.toml`, and translation to
//! `dashwire_core::ClientConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use dashwire_core::{AuthState, ClientConfig, RefreshSettings, StreamSettings, TlsVerification};

const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session.toml";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Dashboard server origin (e.g., "http://127.0.0.1:8080").
    #[serde(default = "default_server")]
    pub server: String,

    /// API base path or absolute URL. Blank means `/api`.
    pub api_base: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub refresh: RefreshSettings,

    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            api_base: None,
            ca_cert: None,
            defaults: Defaults::default(),
            refresh: RefreshSettings::default(),
            stream: StreamConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

/// Log stream tuning as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    pub max_logs: usize,
    pub reconnect_delay_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let defaults = StreamSettings::default();
        Self {
            max_logs: defaults.max_logs,
            reconnect_delay_secs: defaults.reconnect_delay.as_secs(),
        }
    }
}

fn default_server() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

// ── Paths ───────────────────────────────────────────────────────────

/// Platform config directory (XDG on Linux).
pub fn config_dir() -> PathBuf {
    ProjectDirs::from("dev", "dashwire", "dashwire").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("dashwire");
            p
        },
        |dirs| dirs.config_dir().to_path_buf(),
    )
}

pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

pub fn session_path() -> PathBuf {
    config_dir().join(SESSION_FILE)
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` + environment.
///
/// Layering: defaults → TOML file (if present) → `DASHWIRE_*` variables,
/// with `__` separating nested keys (`DASHWIRE_REFRESH__ENABLED=false`).
/// The refresh interval is normalised after extraction.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DASHWIRE_").split("__"));

    let mut config: Config = figment.extract()?;
    config.refresh = config.refresh.normalized();
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Session persistence ─────────────────────────────────────────────

/// Read the persisted session. A missing file is no session.
pub fn load_session_from(path: &Path) -> Result<Option<AuthState>, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let state: AuthState = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(state))
}

pub fn load_session() -> Result<Option<AuthState>, ConfigError> {
    load_session_from(&session_path())
}

/// Write the session file, readable by the owner only.
pub fn save_session_to(state: &AuthState, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(state)?)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

pub fn save_session(state: &AuthState) -> Result<(), ConfigError> {
    save_session_to(state, &session_path())
}

/// Delete the session file. Already gone is fine.
pub fn clear_session_at(path: &Path) -> Result<(), ConfigError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn clear_session() -> Result<(), ConfigError> {
    clear_session_at(&session_path())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ClientConfig`, restoring `session` when it is authenticated.
pub fn to_client_config(
    cfg: &Config,
    session: Option<&AuthState>,
) -> Result<ClientConfig, ConfigError> {
    let server: url::Url = cfg.server.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {}", cfg.server),
    })?;

    let tls = if cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = cfg.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut client = ClientConfig::new(server);
    client.api_base = cfg.api_base.clone().filter(|b| !b.trim().is_empty());
    client.tls = tls;
    client.timeout = Duration::from_secs(cfg.defaults.timeout);
    client.refresh = cfg.refresh.normalized();
    client.stream = StreamSettings {
        max_logs: cfg.stream.max_logs.max(1),
        reconnect_delay: Duration::from_secs(cfg.stream.reconnect_delay_secs),
    };
    client.session_id = session
        .filter(|s| s.is_authenticated && !s.session_id.is_empty())
        .map(|s| SecretString::from(s.session_id.clone()));
    Ok(client)
}
