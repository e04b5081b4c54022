// dashwire-api: async client plumbing for the dashwire dashboard API
// (request gateway, session context, server-sent log stream)

pub mod error;
pub mod gateway;
pub mod models;
pub mod session;
pub mod sse;
pub mod transport;

pub use error::{Error, ErrorBody, HttpError};
pub use gateway::{
    ApiBase, Gateway, Payload, Query, QueryValue, RequestBody, RequestOptions, ResponseInterceptor,
    ResponseKind,
};
pub use models::{DashboardStats, LogHistory, LogRecord, LoginResponse};
pub use session::{MemoryNavigator, Navigator, SessionContext};
pub use sse::{PushConnection, PushEvent, PushTransport, SseTransport};
pub use transport::{TlsMode, TransportConfig};
