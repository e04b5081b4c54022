use std::fmt;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;
use url::Url;

/// Top-level error type for the `dashwire-api` crate.
///
/// Transport failures propagate unmodified; any non-2xx response becomes
/// [`Error::Http`] carrying the status and the best-effort decoded payload.
/// `dashwire-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── HTTP ────────────────────────────────────────────────────────
    /// The server answered with a non-2xx status.
    #[error(transparent)]
    Http(Box<HttpError>),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The endpoint passed to the gateway was blank.
    #[error("HTTP endpoint is required")]
    EmptyEndpoint,

    /// Building the underlying HTTP client failed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A request body could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl Error {
    /// HTTP status of a typed failure, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(e) => Some(e.status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Returns `true` for a 401 typed failure.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Borrow the typed failure, if this is one.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HttpError> for Error {
    fn from(err: HttpError) -> Self {
        Self::Http(Box::new(err))
    }
}

// ── Typed failure ───────────────────────────────────────────────────

/// Decoded body of a failed response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Json(serde_json::Value),
    Text(String),
}

impl ErrorBody {
    /// A human-readable message pulled from the payload.
    ///
    /// JSON payloads are probed for `error`, then `message`.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Json(value) => value
                .get("error")
                .and_then(serde_json::Value::as_str)
                .or_else(|| value.get("message").and_then(serde_json::Value::as_str)),
            Self::Text(text) => Some(text.as_str()),
        }
    }
}

/// A non-2xx response.
///
/// The response body is consumed while decoding [`data`](Self::data); the
/// remaining response metadata is kept alongside it.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub url: Url,
    pub headers: HeaderMap,
    pub data: Option<ErrorBody>,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status.canonical_reason() {
            Some(reason) => write!(f, "HTTP {} {reason}", self.status.as_u16())?,
            None => write!(f, "HTTP {}", self.status.as_u16())?,
        }
        if let Some(message) = self.data.as_ref().and_then(ErrorBody::message) {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpError {}
