// Response interceptors.
//
// Every response passes through the chain in registration order before
// status classification. The first entry is always the 401 interceptor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use url::Url;

use crate::gateway::request::ResponseKind;
use crate::session::SessionContext;

/// What an interceptor knows about the request that produced a response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub url: Url,
    pub response: ResponseKind,
    pub skip_unauthorized_handler: bool,
}

/// Observe or replace a response before the gateway classifies it.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn intercept(&self, response: Response, context: &RequestContext) -> Response;
}

/// Handle returned by [`InterceptorChain::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(u64);

/// Ordered, individually removable interceptors.
#[derive(Default)]
pub struct InterceptorChain {
    entries: RwLock<Vec<(InterceptorId, Arc<dyn ResponseInterceptor>)>>,
    next_id: AtomicU64,
}

impl InterceptorChain {
    pub fn add(&self, interceptor: Arc<dyn ResponseInterceptor>) -> InterceptorId {
        let id = InterceptorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .expect("interceptor lock poisoned")
            .push((id, interceptor));
        id
    }

    /// Remove one entry. Returns `false` if it was already gone.
    pub fn remove(&self, id: InterceptorId) -> bool {
        let mut entries = self.entries.write().expect("interceptor lock poisoned");
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("interceptor lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every interceptor over `response`.
    ///
    /// Iterates a snapshot, so entries added or removed mid-flight only
    /// affect later requests.
    pub(crate) async fn run(&self, mut response: Response, context: &RequestContext) -> Response {
        let snapshot: Vec<Arc<dyn ResponseInterceptor>> = self
            .entries
            .read()
            .expect("interceptor lock poisoned")
            .iter()
            .map(|(_, interceptor)| Arc::clone(interceptor))
            .collect();

        for interceptor in snapshot {
            response = interceptor.intercept(response, context).await;
        }
        response
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.len())
            .finish()
    }
}

// ── 401 handling ────────────────────────────────────────────────────

/// On a 401: run the (coalesced) unauthorized handler, then redirect to
/// login. The response itself passes through untouched.
pub struct UnauthorizedInterceptor {
    session: Arc<SessionContext>,
}

impl UnauthorizedInterceptor {
    pub fn new(session: Arc<SessionContext>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ResponseInterceptor for UnauthorizedInterceptor {
    async fn intercept(&self, response: Response, context: &RequestContext) -> Response {
        if context.skip_unauthorized_handler || response.status() != StatusCode::UNAUTHORIZED {
            return response;
        }

        tracing::debug!(url = %context.url, "401 received");
        self.session.run_unauthorized_handler().await;
        self.session.redirect_to_login();
        response
    }
}
