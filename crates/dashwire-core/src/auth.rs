// ── Session owner ──
//
// Holds the session id and the authenticated flag, installs the shared
// unauthorized handler and answers the log stream's "still logged in?"
// question. State is observable so hosts can persist it.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashwire_api::Gateway;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::dashboard::DashboardStore;
use crate::error::CoreError;
use crate::stream::SessionValidator;

/// Persisted session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthState {
    pub session_id: String,
    pub is_authenticated: bool,
}

impl AuthState {
    pub fn authenticated(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            is_authenticated: true,
        }
    }

    /// Drop states that claim a session without carrying one.
    fn sanitized(self) -> Self {
        let session_id = self.session_id.trim().to_owned();
        if session_id.is_empty() {
            return Self::default();
        }
        Self {
            session_id,
            is_authenticated: self.is_authenticated,
        }
    }
}

/// Session owner. Cheaply cloneable.
#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    gateway: Arc<Gateway>,
    dashboard: DashboardStore,
    state: watch::Sender<AuthState>,
}

impl AuthStore {
    /// Create the store from previously persisted state. Call
    /// [`init`](Self::init) before issuing requests.
    pub fn new(gateway: Arc<Gateway>, dashboard: DashboardStore, stored: Option<AuthState>) -> Self {
        let (state, _) = watch::channel(stored.unwrap_or_default());
        Self {
            inner: Arc::new(AuthInner {
                gateway,
                dashboard,
                state,
            }),
        }
    }

    /// Sanitise the restored state, re-arm the session cookie and register
    /// as the gateway's unauthorized handler.
    pub fn init(&self) {
        let restored = self.state().sanitized();
        if restored.is_authenticated {
            self.inner.gateway.set_session_cookie(&restored.session_id);
        }
        self.apply(restored);

        let weak: Weak<AuthInner> = Arc::downgrade(&self.inner);
        self.inner.gateway.session().set_unauthorized_handler(move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    AuthStore { inner }.handle_unauthorized();
                }
            }
        });
    }

    // ── Observable state ─────────────────────────────────────────

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn session_id(&self) -> String {
        self.inner.state.borrow().session_id.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    // ── Session operations ───────────────────────────────────────

    /// Exchange an auth key for a session and adopt it.
    pub async fn login(&self, auth_key: &SecretString) -> Result<(), CoreError> {
        let response = self.inner.gateway.login(auth_key).await?;
        match response.session_id.filter(|id| !id.trim().is_empty()) {
            Some(session_id) if response.success => {
                self.set_authenticated(&session_id);
                info!("logged in");
                Ok(())
            }
            _ => Err(CoreError::AuthenticationFailed {
                message: if response.message.is_empty() {
                    "login rejected".into()
                } else {
                    response.message
                },
            }),
        }
    }

    /// Adopt `session_id` as the current session.
    pub fn set_authenticated(&self, session_id: &str) {
        self.inner.gateway.set_session_cookie(session_id);
        self.apply(AuthState::authenticated(session_id));
        self.inner.gateway.session().reset_redirect();
    }

    /// Ask the server whether the current session is still good.
    ///
    /// Any answer other than a clean `valid: true` clears the session.
    pub async fn validate_session(&self) -> bool {
        let session_id = self.session_id();
        if session_id.is_empty() {
            self.handle_unauthorized();
            return false;
        }

        match self.inner.gateway.validate_session(&session_id).await {
            Ok(true) => {
                self.apply(AuthState::authenticated(session_id));
                true
            }
            Ok(false) => {
                debug!("server reports session invalid");
                self.handle_unauthorized();
                false
            }
            Err(e) => {
                if e.as_http().is_none() {
                    warn!(error = %e, "failed to validate session");
                }
                self.handle_unauthorized();
                false
            }
        }
    }

    /// End the session on the server. Local state is cleared regardless.
    pub async fn logout(&self) {
        if let Err(e) = self.inner.gateway.logout().await {
            if !e.is_unauthorized() {
                warn!(error = %e, "failed to log out");
            }
        }
        self.clear();
    }

    /// Forget the session and reset dependent stores.
    pub fn clear(&self) {
        self.apply(AuthState::default());
        self.inner.gateway.clear_session_cookie();
        self.inner.dashboard.reset();
    }

    pub fn handle_unauthorized(&self) {
        info!("session cleared");
        self.clear();
    }

    fn apply(&self, next: AuthState) {
        self.inner.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

#[async_trait]
impl SessionValidator for AuthStore {
    async fn validate_session(&self) -> bool {
        AuthStore::validate_session(self).await
    }
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStore")
            .field("is_authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
