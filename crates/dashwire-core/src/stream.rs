// ── Log stream controller ──
//
// Owns one push connection to the server's log stream, a bounded buffer
// of parsed records, and the reconnect state machine:
//
//   connecting → connected → disconnected → (5 s) → connecting …
//
// A terminal transport failure rechecks the session first. An invalid
// session ends in a login redirect and no reconnect.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashwire_api::session::SessionContext;
use dashwire_api::sse::{PushConnection, PushEvent, PushTransport};
use dashwire_api::LogRecord;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_LOGS: usize = 500;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Connection lifecycle of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StreamState {
    Connecting,
    Connected,
    Disconnected,
}

/// Answers "is the current session still good?" after the stream drops.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate_session(&self) -> bool;
}

/// Called with each record after it has been buffered.
pub type LogCallback = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Stream controller options.
#[derive(Clone)]
pub struct StreamOptions {
    pub url: Url,
    pub max_logs: usize,
    pub reconnect_delay: Duration,
    pub on_log: Option<LogCallback>,
}

impl StreamOptions {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            max_logs: DEFAULT_MAX_LOGS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            on_log: None,
        }
    }

    #[must_use]
    pub fn max_logs(mut self, max_logs: usize) -> Self {
        self.max_logs = max_logs;
        self
    }

    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn on_log(mut self, callback: LogCallback) -> Self {
        self.on_log = Some(callback);
        self
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("url", &self.url.as_str())
            .field("max_logs", &self.max_logs)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("on_log", &self.on_log.is_some())
            .finish()
    }
}

// ── Controller ───────────────────────────────────────────────────────

/// Log stream controller. Cheaply cloneable via `Arc<StreamInner>`.
///
/// Background tasks hold clones; call [`disconnect`](Self::disconnect) when
/// done with the stream.
#[derive(Clone)]
pub struct StreamController {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    options: StreamOptions,
    transport: Arc<dyn PushTransport>,
    validator: Arc<dyn SessionValidator>,
    session: Arc<SessionContext>,
    state: watch::Sender<StreamState>,
    logs: watch::Sender<VecDeque<LogRecord>>,
    connection: Mutex<Option<ActiveConnection>>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    next_generation: AtomicU64,
}

struct ActiveConnection {
    generation: u64,
    cancel: CancellationToken,
}

impl StreamController {
    pub fn new(
        options: StreamOptions,
        transport: Arc<dyn PushTransport>,
        validator: Arc<dyn SessionValidator>,
        session: Arc<SessionContext>,
    ) -> Self {
        let (state, _) = watch::channel(StreamState::Disconnected);
        let (logs, _) = watch::channel(VecDeque::new());

        Self {
            inner: Arc::new(StreamInner {
                options,
                transport,
                validator,
                session,
                state,
                logs,
                connection: Mutex::new(None),
                reconnect: Mutex::new(None),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> &StreamOptions {
        &self.inner.options
    }

    // ── Observable state ─────────────────────────────────────────

    pub fn state(&self) -> StreamState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.inner.state.subscribe()
    }

    /// Buffered records, oldest first.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.inner.logs.borrow().iter().cloned().collect()
    }

    pub fn subscribe_logs(&self) -> watch::Receiver<VecDeque<LogRecord>> {
        self.inner.logs.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .connection
            .lock()
            .expect("connection lock poisoned")
            .is_some()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.inner
            .reconnect
            .lock()
            .expect("reconnect lock poisoned")
            .is_some()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the stream. No-op while a connection handle exists.
    pub fn connect(&self) {
        let mut slot = self.inner.connection.lock().expect("connection lock poisoned");
        if slot.is_some() {
            return;
        }

        self.set_state(StreamState::Connecting);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let connection = self.inner.transport.open(&self.inner.options.url);
        let cancel = CancellationToken::new();
        debug!(generation, url = %self.inner.options.url, "opening log stream");

        tokio::spawn(read_events(
            self.clone(),
            connection,
            generation,
            cancel.clone(),
        ));
        *slot = Some(ActiveConnection { generation, cancel });
    }

    /// Cancel any pending reconnect, close the connection, go `disconnected`.
    /// Safe to call repeatedly.
    pub fn disconnect(&self) {
        if let Some(timer) = self
            .inner
            .reconnect
            .lock()
            .expect("reconnect lock poisoned")
            .take()
        {
            timer.abort();
        }
        if let Some(connection) = self
            .inner
            .connection
            .lock()
            .expect("connection lock poisoned")
            .take()
        {
            connection.cancel.cancel();
            debug!(generation = connection.generation, "log stream closed");
        }
        self.set_state(StreamState::Disconnected);
    }

    /// Empty the buffer. The connection is left alone.
    pub fn clear_logs(&self) {
        self.inner.logs.send_modify(VecDeque::clear);
    }

    /// React to the transport giving up on the stream.
    ///
    /// Rechecks the session. Invalid: disconnect and redirect to login.
    /// Valid: disconnect and schedule a single reconnect.
    ///
    /// Does nothing further when the connection was closed or replaced
    /// while the session was being checked.
    pub async fn handle_closed(&self) {
        let generation = self.current_generation();
        self.set_state(StreamState::Disconnected);

        let valid = self.inner.validator.validate_session().await;
        if !generation.is_some_and(|g| self.is_current(g)) {
            debug!("log stream closed during session check, not reconnecting");
            return;
        }

        self.disconnect();
        if valid {
            self.schedule_reconnect();
        } else {
            info!("session no longer valid, not reconnecting log stream");
            self.inner.session.redirect_to_login();
        }
    }

    fn schedule_reconnect(&self) {
        let mut slot = self.inner.reconnect.lock().expect("reconnect lock poisoned");
        if slot.is_some() {
            return;
        }

        let delay = self.inner.options.reconnect_delay;
        info!(delay_secs = delay.as_secs(), "log stream reconnect scheduled");
        let controller = self.clone();
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut pending = controller
                .inner
                .reconnect
                .lock()
                .expect("reconnect lock poisoned");
            // Emptied by `disconnect` after the sleep finished.
            if pending.take().is_none() {
                return;
            }
            controller.connect();
        }));
    }

    // ── Event handling ───────────────────────────────────────────

    fn set_state(&self, state: StreamState) {
        self.inner.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn current_generation(&self) -> Option<u64> {
        self.inner
            .connection
            .lock()
            .expect("connection lock poisoned")
            .as_ref()
            .map(|c| c.generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner
            .connection
            .lock()
            .expect("connection lock poisoned")
            .as_ref()
            .is_some_and(|c| c.generation == generation)
    }

    fn handle_message(&self, data: &str) {
        let record = match LogRecord::from_wire(data) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "dropping malformed log record");
                return;
            }
        };

        let echo = self.inner.options.on_log.as_ref().map(|cb| (cb, record.clone()));
        let max = self.inner.options.max_logs;
        self.inner.logs.send_modify(|logs| {
            logs.push_back(record);
            while logs.len() > max {
                logs.pop_front();
            }
        });

        if let Some((callback, record)) = echo {
            callback(&record);
        }
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("state", &self.state())
            .field("buffered", &self.inner.logs.borrow().len())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

// ── Background reader ────────────────────────────────────────────────

async fn read_events(
    controller: StreamController,
    mut connection: PushConnection,
    generation: u64,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = connection.next_event() => event,
        };

        match event {
            Some(PushEvent::Opened) => {
                info!("log stream connected");
                controller.set_state(StreamState::Connected);
            }
            Some(PushEvent::Message(data)) => controller.handle_message(&data),
            Some(PushEvent::Error {
                closed: false,
                reason,
            }) => {
                warn!(%reason, "log stream interrupted");
                controller.set_state(StreamState::Connecting);
            }
            Some(PushEvent::Error { closed: true, reason }) => {
                warn!(%reason, "log stream closed by transport");
                close_current(controller, generation);
                break;
            }
            None => {
                warn!("log stream transport ended");
                close_current(controller, generation);
                break;
            }
        }
    }

    connection.close();
}

/// Hand a terminal close to [`StreamController::handle_closed`] on its own
/// task, unless this connection was already replaced.
fn close_current(controller: StreamController, generation: u64) {
    if !controller.is_current(generation) {
        return;
    }
    controller.set_state(StreamState::Disconnected);
    tokio::spawn(async move { controller.handle_closed().await });
}
