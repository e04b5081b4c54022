// Log endpoints: buffered history and the push stream location.

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::gateway::client::Gateway;
use crate::gateway::request::RequestOptions;
use crate::models::LogHistory;

/// Endpoint of the server-sent log stream.
pub const LOG_STREAM_ENDPOINT: &str = "/logs/stream";

impl Gateway {
    /// Fetch the server's buffered log lines, oldest first.
    ///
    /// `GET /api/logs/history`
    pub async fn log_history(&self) -> Result<LogHistory, Error> {
        debug!("fetching log history");
        self.fetch("/logs/history", RequestOptions::get()).await
    }

    /// Absolute URL of the log stream.
    pub fn log_stream_url(&self) -> Result<Url, Error> {
        self.build_url(LOG_STREAM_ENDPOINT, None)
    }
}
