// Shared transport configuration for building reqwest::Client instances.
//
// The gateway keeps two clients built from the same settings: one wired to
// the session cookie jar (credentials included) and one without it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;

use crate::error::Error;

const USER_AGENT: &str = concat!("dashwire/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode for the dashboard server.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed development servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
///
/// `timeout` is the only deadline applied to one-shot calls; the gateway
/// adds none of its own.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Option<Duration>,
    pub cookie_jar: Arc<Jar>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Some(Duration::from_secs(30)),
            cookie_jar: Arc::new(Jar::default()),
        }
    }
}

impl TransportConfig {
    /// Build a client that sends and stores cookies through the shared jar.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()?
            .cookie_provider(Arc::clone(&self.cookie_jar))
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    /// Build a client that never attaches cookies.
    pub fn build_anonymous_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()?
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    /// Build a client for long-lived streams: cookies, no overall timeout.
    pub fn build_stream_client(&self) -> Result<reqwest::Client, Error> {
        let mut config = self.clone();
        config.timeout = None;
        config.build_client()
    }

    fn builder(&self) -> Result<reqwest::ClientBuilder, Error> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::ClientBuild(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::ClientBuild(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        Ok(builder)
    }
}
