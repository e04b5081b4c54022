// Request gateway
//
// One place where every one-shot API call goes through: URL resolution,
// query building, body shaping, response interception and typed failures.

pub mod auth;
pub mod client;
pub mod dashboard;
pub mod interceptor;
pub mod logs;
pub mod path;
pub mod request;
pub mod response;

pub use client::{Gateway, SESSION_COOKIE};
pub use interceptor::{
    InterceptorChain, InterceptorId, RequestContext, ResponseInterceptor, UnauthorizedInterceptor,
};
pub use logs::LOG_STREAM_ENDPOINT;
pub use request::{Credentials, RequestBody, RequestOptions, ResponseKind};
pub use response::Payload;
pub use path::{ApiBase, DEFAULT_API_BASE, Query, QueryValue, append_query, is_absolute_url};
