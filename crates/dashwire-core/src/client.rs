// ── Client facade ──
//
// Wires one gateway, one session context and the stores around a single
// `ClientConfig`. The log stream transport shares the gateway's cookie jar
// so it rides on the same session.

use std::sync::Arc;

use dashwire_api::session::{Navigator, SessionContext};
use dashwire_api::{DashboardStats, Gateway, LogRecord, SseTransport, TransportConfig};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::auth::{AuthState, AuthStore};
use crate::config::ClientConfig;
use crate::dashboard::DashboardStore;
use crate::environment::Environment;
use crate::error::CoreError;
use crate::notifications::Notifications;
use crate::refresh::RefreshScheduler;
use crate::stream::{LogCallback, StreamController, StreamOptions};

/// Entry point for consumers. Cheaply cloneable via `Arc<ClientInner>`.
///
/// Does not start anything on construction; call
/// [`RefreshScheduler::start`] on [`refresh()`](Self::refresh) and
/// [`StreamController::connect`] on a [`log_stream()`](Self::log_stream)
/// as needed.
#[derive(Clone)]
pub struct DashboardClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: TransportConfig,
    session: Arc<SessionContext>,
    gateway: Arc<Gateway>,
    auth: AuthStore,
    dashboard: DashboardStore,
    notifications: Notifications,
    environment: Environment,
    refresh: RefreshScheduler,
}

impl DashboardClient {
    /// Build the client and restore the configured session, if any.
    pub fn new(config: ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self, CoreError> {
        let transport = config.transport();
        let session = Arc::new(SessionContext::new(navigator));
        let gateway = Arc::new(Gateway::new(
            config.server.clone(),
            config.api_base.as_deref(),
            &transport,
            Arc::clone(&session),
        )?);

        let dashboard = DashboardStore::new();
        let stored = config
            .session_id
            .as_ref()
            .map(|id| AuthState::authenticated(id.expose_secret()));
        let auth = AuthStore::new(Arc::clone(&gateway), dashboard.clone(), stored);
        auth.init();

        let environment = Environment::new();
        let refresh = RefreshScheduler::new(config.refresh.normalized(), environment.clone());

        debug!(server = %config.server, "dashboard client ready");
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                session,
                gateway,
                auth,
                dashboard,
                notifications: Notifications::new(),
                environment,
                refresh,
            }),
        })
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.inner.session
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.inner.gateway
    }

    pub fn auth(&self) -> &AuthStore {
        &self.inner.auth
    }

    pub fn dashboard(&self) -> &DashboardStore {
        &self.inner.dashboard
    }

    pub fn notifications(&self) -> &Notifications {
        &self.inner.notifications
    }

    pub fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    pub fn refresh(&self) -> &RefreshScheduler {
        &self.inner.refresh
    }

    // ── Operations ───────────────────────────────────────────────

    /// Fetch dashboard stats into the dashboard store.
    pub async fn refresh_dashboard(&self) -> Result<DashboardStats, CoreError> {
        self.inner.dashboard.load(&self.inner.gateway).await
    }

    /// The server's buffered log lines, oldest first.
    pub async fn log_history(&self) -> Result<Vec<LogRecord>, CoreError> {
        Ok(self.inner.gateway.log_history().await?.logs)
    }

    /// A stream controller for the server log stream. Not yet connected.
    pub fn log_stream(&self, on_log: Option<LogCallback>) -> Result<StreamController, CoreError> {
        let url = self.inner.gateway.log_stream_url()?;
        let settings = self.inner.config.stream;
        let mut options = StreamOptions::new(url)
            .max_logs(settings.max_logs)
            .reconnect_delay(settings.reconnect_delay);
        options.on_log = on_log;

        let transport = SseTransport::new(&self.inner.transport)?;
        Ok(StreamController::new(
            options,
            Arc::new(transport),
            Arc::new(self.inner.auth.clone()),
            Arc::clone(&self.inner.session),
        ))
    }

    /// Stop the shared refresh timer.
    pub fn shutdown(&self) {
        self.inner.refresh.shutdown();
    }
}

impl std::fmt::Debug for DashboardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardClient")
            .field("server", &self.inner.config.server.as_str())
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}
