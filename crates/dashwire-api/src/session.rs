//! Session context shared by every component that reacts to a 401.
//!
//! Holds the single-slot unauthorized handler, the in-flight unauthorized
//! episode and the "redirect already issued" guard. One context is created at
//! start-up and passed around by `Arc`; tests build isolated instances.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info};
use url::form_urlencoded;

/// Path of the login view.
pub const LOGIN_PATH: &str = "/login";

/// Callback run when the session turns out to be invalid.
pub type UnauthorizedHandler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

type Episode = Shared<BoxFuture<'static, ()>>;

// ── Navigator ───────────────────────────────────────────────────────

/// Host location capability: where the user is, and how to move them.
pub trait Navigator: Send + Sync {
    /// Current in-app location (path + query + fragment).
    fn current_path(&self) -> String;

    /// Replace the current location without keeping a history entry.
    fn replace(&self, target: &str);
}

/// In-memory [`Navigator`] that records every replacement.
#[derive(Debug)]
pub struct MemoryNavigator {
    location: RwLock<String>,
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            location: RwLock::new(initial.into()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Move to `path` as a regular navigation (not recorded as a redirect).
    pub fn navigate(&self, path: impl Into<String>) {
        *self.location.write().expect("navigator lock poisoned") = path.into();
    }

    /// Every target passed to [`Navigator::replace`], oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.history.lock().expect("navigator lock poisoned").clone()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.location.read().expect("navigator lock poisoned").clone()
    }

    fn replace(&self, target: &str) {
        self.navigate(target);
        self.history
            .lock()
            .expect("navigator lock poisoned")
            .push(target.to_owned());
    }
}

// ── Redirect targets ────────────────────────────────────────────────

/// Accept `value` as a post-login return target.
///
/// Only absolute in-app paths qualify: must start with `/`, must not be
/// protocol-relative (`//host`) and must not point back at the login view.
pub fn resolve_redirect_path(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if !trimmed.starts_with('/') || trimmed.starts_with("//") || trimmed.starts_with(LOGIN_PATH) {
        return None;
    }
    Some(trimmed)
}

/// Login view location carrying `current_path` as its `redirect` target.
pub fn build_login_redirect_path(current_path: &str) -> String {
    match resolve_redirect_path(current_path) {
        Some(path) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("redirect", path)
                .finish();
            format!("{LOGIN_PATH}?{query}")
        }
        None => LOGIN_PATH.to_owned(),
    }
}

// ── SessionContext ──────────────────────────────────────────────────

/// Cross-cutting session state for one client instance.
pub struct SessionContext {
    handler: RwLock<Option<UnauthorizedHandler>>,
    episode: Mutex<Option<(u64, Episode)>>,
    next_episode: AtomicU64,
    redirecting: AtomicBool,
    navigator: Arc<dyn Navigator>,
}

impl SessionContext {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            handler: RwLock::new(None),
            episode: Mutex::new(None),
            next_episode: AtomicU64::new(0),
            redirecting: AtomicBool::new(false),
            navigator,
        }
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Install the unauthorized handler, replacing any previous one.
    pub fn set_unauthorized_handler<F, Fut>(&self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: UnauthorizedHandler = Arc::new(move || handler().boxed());
        *self.handler.write().expect("handler lock poisoned") = Some(handler);
    }

    pub fn clear_unauthorized_handler(&self) {
        *self.handler.write().expect("handler lock poisoned") = None;
    }

    pub fn has_unauthorized_handler(&self) -> bool {
        self.handler.read().expect("handler lock poisoned").is_some()
    }

    /// Run the unauthorized handler, joining an episode already in flight.
    ///
    /// Overlapping callers all await the same invocation; the slot is freed
    /// once it settles so a later 401 starts a fresh episode.
    pub async fn run_unauthorized_handler(&self) {
        let (id, episode) = {
            let mut slot = self.episode.lock().expect("episode lock poisoned");
            if let Some((id, episode)) = slot.as_ref() {
                debug!(episode = id, "joining unauthorized episode in flight");
                (*id, episode.clone())
            } else {
                let Some(handler) = self.handler.read().expect("handler lock poisoned").clone()
                else {
                    return;
                };
                let id = self.next_episode.fetch_add(1, Ordering::Relaxed);
                let episode = handler().shared();
                *slot = Some((id, episode.clone()));
                info!(episode = id, "session unauthorized, running handler");
                (id, episode)
            }
        };

        episode.await;

        let mut slot = self.episode.lock().expect("episode lock poisoned");
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
    }

    /// Send the user to the login view, carrying the current location.
    pub fn redirect_to_login(&self) {
        let current = self.navigator.current_path();
        self.redirect_to_login_from(&current);
    }

    /// Send the user to the login view with `current_path` as return target.
    ///
    /// At most one redirect is issued until [`reset_redirect`](Self::reset_redirect).
    pub fn redirect_to_login_from(&self, current_path: &str) {
        if self.redirecting.load(Ordering::Acquire) {
            return;
        }

        let target = build_login_redirect_path(current_path);
        if target == self.navigator.current_path() {
            return;
        }

        if self
            .redirecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        info!(%target, "redirecting to login");
        self.navigator.replace(&target);
    }

    pub fn is_redirecting(&self) -> bool {
        self.redirecting.load(Ordering::Acquire)
    }

    /// Re-arm the redirect guard (after a successful login).
    pub fn reset_redirect(&self) {
        self.redirecting.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("has_handler", &self.has_unauthorized_handler())
            .field("redirecting", &self.is_redirecting())
            .finish_non_exhaustive()
    }
}
