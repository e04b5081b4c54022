// ── Core error types ──
//
// User-facing errors from dashwire-core. Consumers see session and server
// failures, not raw transport details. The `From<dashwire_api::Error>` impl
// translates gateway errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Server request timed out")]
    Timeout,

    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not logged in")]
    NotAuthenticated,

    // ── Server errors ────────────────────────────────────────────────
    #[error("Server error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Unexpected response: {message}")]
    InvalidResponse { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the server rejected the session or credentials.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::NotAuthenticated
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<dashwire_api::Error> for CoreError {
    fn from(err: dashwire_api::Error) -> Self {
        match err {
            dashwire_api::Error::Http(http) => {
                let status = http.status.as_u16();
                let message = http
                    .data
                    .as_ref()
                    .and_then(dashwire_api::ErrorBody::message)
                    .map_or_else(|| http.to_string(), str::to_owned);
                if status == 401 {
                    CoreError::AuthenticationFailed { message }
                } else {
                    CoreError::Api {
                        message,
                        status: Some(status),
                    }
                }
            }
            dashwire_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            dashwire_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            dashwire_api::Error::EmptyEndpoint => {
                CoreError::Internal("HTTP endpoint is required".into())
            }
            dashwire_api::Error::ClientBuild(message) => CoreError::Config { message },
            dashwire_api::Error::Deserialization { message, .. } => {
                CoreError::InvalidResponse { message }
            }
            dashwire_api::Error::Serialization(e) => CoreError::Internal(e.to_string()),
        }
    }
}
