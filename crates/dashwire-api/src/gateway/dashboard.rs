// Dashboard endpoints.

use tracing::debug;

use crate::error::Error;
use crate::gateway::client::Gateway;
use crate::gateway::request::RequestOptions;
use crate::models::DashboardStats;

impl Gateway {
    /// Fetch server memory usage and start time.
    ///
    /// `GET /api/dashboard/stats`
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, Error> {
        debug!("fetching dashboard stats");
        self.fetch("/dashboard/stats", RequestOptions::get()).await
    }
}
