//! Session, log stream and refresh services between `dashwire-api` and UI
//! consumers (the CLI today).
//!
//! - **[`DashboardClient`]**: Facade wiring one gateway, one
//!   [`SessionContext`](dashwire_api::SessionContext) and the stores below
//!   from a single [`ClientConfig`].
//!
//! - **[`StreamController`]**: Keeps the server log stream open, buffers
//!   the newest records and reconnects after the transport gives up, unless
//!   the session is gone.
//!
//! - **[`RefreshScheduler`]**: Keyed polling callbacks driven by one shared
//!   timer that only runs while enabled, online and visible.
//!
//! - **[`AuthStore`]**: Owns the session id, installs the unauthorized
//!   handler and validates the session for the stream controller.
//!
//! - **[`DashboardStore`]** / **[`Notifications`]**: Observable snapshot
//!   and toast state for hosts to render.

pub mod auth;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod environment;
pub mod error;
pub mod notifications;
pub mod refresh;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth::{AuthState, AuthStore};
pub use client::DashboardClient;
pub use config::{ClientConfig, StreamSettings, TlsVerification};
pub use dashboard::{DashboardStore, format_start_time, format_uptime};
pub use environment::Environment;
pub use error::CoreError;
pub use notifications::{Notifications, Toast, ToastKind};
pub use refresh::{
    RefreshResult, RefreshScheduler, RefreshSettings, RegisterOptions, Subscription,
    normalize_interval_secs,
};
pub use stream::{LogCallback, SessionValidator, StreamController, StreamOptions, StreamState};

// Wire types consumers need without depending on dashwire-api directly.
pub use dashwire_api::models::LevelClass;
pub use dashwire_api::{DashboardStats, LogRecord, Navigator};
