// Gateway HTTP client
//
// Wraps `reqwest::Client` with API base resolution, query building, body
// shaping, the response interceptor chain and typed failures. Endpoint
// methods (auth, dashboard, logs) live in sibling files as inherent methods.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::{Url, form_urlencoded};

use crate::error::Error;
use crate::gateway::interceptor::{
    InterceptorChain, InterceptorId, RequestContext, ResponseInterceptor, UnauthorizedInterceptor,
};
use crate::gateway::request::{Credentials, RequestBody, RequestOptions, ResponseKind};
use crate::gateway::response::{Payload, decode_error, decode_success};
use crate::gateway::path::{ApiBase, Query, append_query, is_absolute_url};
use crate::session::SessionContext;
use crate::transport::TransportConfig;

/// Name of the cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "session_id";

/// Single entry point for every one-shot call to the dashboard API.
pub struct Gateway {
    http: reqwest::Client,
    anonymous: reqwest::Client,
    cookie_jar: Option<Arc<Jar>>,
    origin: Url,
    base: ApiBase,
    interceptors: InterceptorChain,
    session: Arc<SessionContext>,
}

impl Gateway {
    /// Create a gateway for the server at `origin`.
    ///
    /// `api_base` may be blank (→ `/api`), a path, or an absolute URL.
    pub fn new(
        origin: Url,
        api_base: Option<&str>,
        transport: &TransportConfig,
        session: Arc<SessionContext>,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let anonymous = transport.build_anonymous_client()?;
        let mut gateway = Self::with_client(http, origin, ApiBase::parse(api_base)?, session);
        gateway.anonymous = anonymous;
        gateway.cookie_jar = Some(Arc::clone(&transport.cookie_jar));
        Ok(gateway)
    }

    /// Create a gateway around a pre-built client.
    ///
    /// The same client serves credentialed and anonymous calls, and
    /// [`set_session_cookie`](Self::set_session_cookie) is a no-op.
    pub fn with_client(
        http: reqwest::Client,
        origin: Url,
        base: ApiBase,
        session: Arc<SessionContext>,
    ) -> Self {
        let interceptors = InterceptorChain::default();
        interceptors.add(Arc::new(UnauthorizedInterceptor::new(Arc::clone(&session))));
        Self {
            anonymous: http.clone(),
            http,
            cookie_jar: None,
            origin,
            base,
            interceptors,
            session,
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn api_base(&self) -> &ApiBase {
        &self.base
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// The credentialed client (shared with the log stream transport).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ────────────────────────────────────────────────

    /// Resolve `endpoint` against the API base.
    ///
    /// Relative bases give relative results; see [`ApiBase::resolve`].
    pub fn resolve(&self, endpoint: &str) -> Result<String, Error> {
        self.base.resolve(endpoint)
    }

    /// Absolute URL for `endpoint`, with `query` appended.
    pub fn build_url(&self, endpoint: &str, query: Option<&Query>) -> Result<Url, Error> {
        let resolved = self.resolve(endpoint)?;
        let resolved = match query {
            Some(query) if !query.is_empty() => append_query(&resolved, query),
            _ => resolved,
        };
        if is_absolute_url(&resolved) {
            Ok(Url::parse(&resolved)?)
        } else {
            Ok(self.origin.join(&resolved)?)
        }
    }

    // ── Interceptors ────────────────────────────────────────────────

    /// Append an interceptor after the existing ones.
    pub fn add_interceptor(&self, interceptor: Arc<dyn ResponseInterceptor>) -> InterceptorId {
        self.interceptors.add(interceptor)
    }

    pub fn remove_interceptor(&self, id: InterceptorId) -> bool {
        self.interceptors.remove(id)
    }

    // ── Session cookie ──────────────────────────────────────────────

    /// Store the session identifier as a cookie for the server origin.
    pub fn set_session_cookie(&self, session_id: &str) {
        let Some(jar) = &self.cookie_jar else {
            return;
        };
        jar.add_cookie_str(&format!("{SESSION_COOKIE}={session_id}; Path=/"), &self.origin);
        debug!("session cookie stored");
    }

    /// Expire the session cookie for the server origin.
    pub fn clear_session_cookie(&self) {
        let Some(jar) = &self.cookie_jar else {
            return;
        };
        jar.add_cookie_str(&format!("{SESSION_COOKIE}=; Max-Age=0; Path=/"), &self.origin);
    }

    // ── Request helpers ─────────────────────────────────────────────

    /// Issue one request.
    ///
    /// Transport failures propagate unmodified. Every response runs through
    /// the interceptor chain; non-2xx responses then become [`Error::Http`].
    pub async fn send(&self, endpoint: &str, options: RequestOptions) -> Result<Payload, Error> {
        let RequestOptions {
            method,
            mut headers,
            query,
            body,
            response: kind,
            credentials,
            skip_unauthorized_handler,
        } = options;

        let url = self.build_url(endpoint, query.as_ref())?;
        debug!("{} {}", method, url);

        let client = match credentials {
            Credentials::Include => &self.http,
            Credentials::Omit => &self.anonymous,
        };

        let context = RequestContext {
            method: method.clone(),
            url: url.clone(),
            response: kind,
            skip_unauthorized_handler,
        };

        if let Some(content_type) = body.as_ref().and_then(RequestBody::default_content_type) {
            headers.entry(CONTENT_TYPE).or_insert(content_type);
        }

        let mut request = client.request(method, url);
        request = match body {
            None => request,
            Some(RequestBody::Json(value)) => {
                request.body(serde_json::to_vec(&value).map_err(Error::Serialization)?)
            }
            Some(RequestBody::Form(pairs)) => request.body(
                form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs.iter())
                    .finish(),
            ),
            Some(RequestBody::Raw(raw)) => request.body(raw),
        };

        let response = request.headers(headers).send().await?;
        let response = self.interceptors.run(response, &context).await;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), url = %context.url, "request failed");
            return Err(decode_error(response).await.into());
        }

        decode_success(response, kind).await
    }

    /// Issue one request and deserialize its JSON body, if any.
    pub async fn json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, Error> {
        self.send(endpoint, options.response(ResponseKind::Json))
            .await?
            .into_json()
    }

    /// Like [`json`](Self::json), but an empty body is an error.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, Error> {
        self.json(endpoint, options)
            .await?
            .ok_or_else(|| Error::Deserialization {
                message: format!("empty response body from {endpoint}"),
                body: String::new(),
            })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("origin", &self.origin.as_str())
            .field("base", &self.base)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}
