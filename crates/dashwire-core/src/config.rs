// ── Runtime connection configuration ──
//
// These types describe *how* to reach a dashboard server. They carry the
// session and connection tuning, but never touch disk. The CLI builds a
// `ClientConfig` (usually via dashwire-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use dashwire_api::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::refresh::RefreshSettings;
use crate::stream::{DEFAULT_MAX_LOGS, DEFAULT_RECONNECT_DELAY};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn to_transport(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Log stream tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Records kept in memory, oldest evicted first.
    pub max_logs: usize,
    /// Wait before reopening after the transport gave up.
    pub reconnect_delay: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            max_logs: DEFAULT_MAX_LOGS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Configuration for talking to one dashboard server.
///
/// Built by the CLI, passed to [`DashboardClient`](crate::DashboardClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server origin (e.g., `http://127.0.0.1:8080`).
    pub server: Url,
    /// API base: blank for `/api`, a path, or an absolute URL.
    pub api_base: Option<String>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Per-request timeout. The only deadline one-shot calls get.
    pub timeout: Duration,
    pub refresh: RefreshSettings,
    pub stream: StreamSettings,
    /// Previously issued session, restored on start-up.
    pub session_id: Option<SecretString>,
}

impl ClientConfig {
    pub fn new(server: Url) -> Self {
        Self {
            server,
            api_base: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            refresh: RefreshSettings::default(),
            stream: StreamSettings::default(),
            session_id: None,
        }
    }

    /// Transport settings for a fresh cookie jar.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.to_transport(),
            timeout: Some(self.timeout),
            ..TransportConfig::default()
        }
    }
}
