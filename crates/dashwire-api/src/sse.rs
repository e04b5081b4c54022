//! Server-sent event stream with transport-level reconnect.
//!
//! Opens `text/event-stream` endpoints and forwards each message payload
//! through an [`mpsc`] channel as [`PushEvent`]s. Network drops are reported
//! as non-terminal errors and retried after the server-advertised `retry`
//! delay. A rejected connection (non-200 status, wrong content type) is
//! reported once as terminal and the loop stops.
//!
//! # Example
//!
//! ```rust,ignore
//! use dashwire_api::sse::{PushEvent, PushTransport, SseTransport};
//!
//! let transport = SseTransport::with_client(reqwest::Client::new());
//! let mut conn = transport.open(&url);
//!
//! while let Some(event) = conn.next_event().await {
//!     if let PushEvent::Message(data) = event {
//!         println!("{data}");
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Reconnect delay used until the server sends a `retry:` field.
pub const DEFAULT_RETRY: Duration = Duration::from_secs(3);

// ── Events ──────────────────────────────────────────────────────────

/// What a push connection reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The stream is open (sent again after each transport reconnect).
    Opened,
    /// One message payload.
    Message(String),
    /// The stream failed. `closed` means the transport gave up for good.
    Error { closed: bool, reason: String },
}

// ── PushConnection ──────────────────────────────────────────────────

/// Receiving end of one push stream. Dropping it closes the stream.
#[derive(Debug)]
pub struct PushConnection {
    events: mpsc::Receiver<PushEvent>,
    cancel: CancellationToken,
}

impl PushConnection {
    pub fn new(events: mpsc::Receiver<PushEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next event, or `None` once the transport side is gone.
    pub async fn next_event(&mut self) -> Option<PushEvent> {
        self.events.recv().await
    }

    /// Stop the transport. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for PushConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens push connections.
pub trait PushTransport: Send + Sync {
    /// Start connecting to `url`. Returns immediately; the outcome arrives
    /// as events on the connection.
    fn open(&self, url: &Url) -> PushConnection;
}

// ── SseTransport ────────────────────────────────────────────────────

/// [`PushTransport`] over HTTP server-sent events.
#[derive(Debug, Clone)]
pub struct SseTransport {
    http: reqwest::Client,
    retry: Duration,
}

impl SseTransport {
    /// Build a transport with its own stream client (no overall timeout).
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_stream_client()?))
    }

    /// Use a pre-built client. It must not carry an overall request timeout.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            retry: DEFAULT_RETRY,
        }
    }

    /// Override the initial reconnect delay.
    #[must_use]
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }
}

impl PushTransport for SseTransport {
    fn open(&self, url: &Url) -> PushConnection {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let http = self.http.clone();
        let url = url.clone();
        let retry = self.retry;
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            sse_loop(http, url, event_tx, retry, task_cancel).await;
        });

        PushConnection::new(event_rx, cancel)
    }
}

// ── Background loop ─────────────────────────────────────────────────

enum ReadOutcome {
    /// The server refused the stream; do not retry.
    Rejected(String),
    /// The connection dropped; retry after the delay.
    Dropped(String),
    /// Nobody is listening any more.
    ReceiverGone,
}

/// Main loop: connect → read → on drop, wait → reconnect.
async fn sse_loop(
    http: reqwest::Client,
    url: Url,
    event_tx: mpsc::Sender<PushEvent>,
    mut retry: Duration,
    cancel: CancellationToken,
) {
    let mut last_event_id: Option<String> = None;

    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = connect_and_read(&http, &url, &event_tx, &mut retry, &mut last_event_id) => outcome,
        };

        match outcome {
            ReadOutcome::ReceiverGone => break,
            ReadOutcome::Rejected(reason) => {
                tracing::warn!(%url, %reason, "event stream rejected");
                let _ = event_tx
                    .send(PushEvent::Error {
                        closed: true,
                        reason,
                    })
                    .await;
                break;
            }
            ReadOutcome::Dropped(reason) => {
                tracing::info!(
                    %reason,
                    delay_ms = u64::try_from(retry.as_millis()).unwrap_or(u64::MAX),
                    "event stream dropped, reconnecting"
                );
                let event = PushEvent::Error {
                    closed: false,
                    reason,
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(retry) => {}
                }
            }
        }
    }

    tracing::debug!(%url, "event stream loop exiting");
}

async fn connect_and_read(
    http: &reqwest::Client,
    url: &Url,
    event_tx: &mpsc::Sender<PushEvent>,
    retry: &mut Duration,
    last_event_id: &mut Option<String>,
) -> ReadOutcome {
    let mut request = http
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = last_event_id.as_deref() {
        request = request.header("Last-Event-ID", id);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return ReadOutcome::Dropped(e.to_string()),
    };

    let status = response.status();
    if status != StatusCode::OK {
        return ReadOutcome::Rejected(format!("HTTP {}", status.as_u16()));
    }
    let is_event_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"));
    if !is_event_stream {
        return ReadOutcome::Rejected("response is not an event stream".into());
    }

    tracing::debug!(%url, "event stream open");
    if event_tx.send(PushEvent::Opened).await.is_err() {
        return ReadOutcome::ReceiverGone;
    }

    let mut parser = SseParser::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return ReadOutcome::Dropped(e.to_string()),
        };
        for frame in parser.feed(&chunk) {
            if let Some(ms) = frame.retry {
                *retry = Duration::from_millis(ms);
            }
            if frame.id.is_some() {
                *last_event_id = frame.id;
            }
            if let Some(data) = frame.data {
                if event_tx.send(PushEvent::Message(data)).await.is_err() {
                    return ReadOutcome::ReceiverGone;
                }
            }
        }
    }

    ReadOutcome::Dropped("stream ended".into())
}

// ── Line parser ─────────────────────────────────────────────────────

/// One dispatched event block.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct SseFrame {
    /// Joined `data:` lines of a default (`message`) event.
    pub data: Option<String>,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

/// Incremental `text/event-stream` parser.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across chunks survive.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: Vec<u8>,
    data: Vec<String>,
    event_type: String,
    id: Option<String>,
    retry: Option<u64>,
}

impl SseParser {
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment (heartbeat)
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_owned()),
            "event" => value.clone_into(&mut self.event_type),
            "id" if !value.contains('\0') => self.id = Some(value.to_owned()),
            "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                self.retry = value.parse().ok();
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let lines = std::mem::take(&mut self.data);
        let event_type = std::mem::take(&mut self.event_type);
        let frame = SseFrame {
            data: (!lines.is_empty() && (event_type.is_empty() || event_type == "message"))
                .then(|| lines.join("\n")),
            id: self.id.take(),
            retry: self.retry.take(),
        };
        (frame != SseFrame::default()).then_some(frame)
    }
}
