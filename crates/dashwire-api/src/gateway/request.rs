// Per-call request options for the gateway.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::Error;
use crate::gateway::path::Query;

/// How a successful response body is delivered to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseKind {
    /// Parse as JSON; an empty body yields [`Payload::Empty`](super::Payload::Empty).
    #[default]
    Json,
    Text,
    Bytes,
    /// Hand back the unread response.
    Raw,
}

/// Whether the session cookie travels with the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Include,
    Omit,
}

/// Request body shapes.
///
/// Structured values are encoded as JSON; form pairs and raw bodies pass
/// through. A default `Content-Type` is only set when the caller did not
/// provide one.
#[derive(Debug)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Raw(reqwest::Body),
}

impl RequestBody {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(Error::Serialization)
    }

    pub(crate) fn default_content_type(&self) -> Option<HeaderValue> {
        match self {
            Self::Json(_) => Some(HeaderValue::from_static("application/json")),
            Self::Form(_) => Some(HeaderValue::from_static(
                "application/x-www-form-urlencoded",
            )),
            Self::Raw(_) => None,
        }
    }
}

/// Options for one [`Gateway::send`](super::Gateway::send) call.
#[derive(Debug)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Option<Query>,
    pub body: Option<RequestBody>,
    pub response: ResponseKind,
    pub credentials: Credentials,
    /// Leave 401 responses to the caller: no handler, no redirect.
    pub skip_unauthorized_handler: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            query: None,
            body: None,
            response: ResponseKind::Json,
            credentials: Credentials::Include,
            skip_unauthorized_handler: false,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self::default().method(Method::POST)
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, Error> {
        Ok(self.body(RequestBody::json(value)?))
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn response(mut self, kind: ResponseKind) -> Self {
        self.response = kind;
        self
    }

    #[must_use]
    pub fn omit_credentials(mut self) -> Self {
        self.credentials = Credentials::Omit;
        self
    }

    #[must_use]
    pub fn skip_unauthorized_handler(mut self) -> Self {
        self.skip_unauthorized_handler = true;
        self
    }
}
