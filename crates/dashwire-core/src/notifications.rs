// ── Toast queue ──
//
// Short user-facing notices with optional auto-dismiss. Hosts render the
// current list from `subscribe()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Lifetime of a toast unless the caller picks another.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
    /// Zero keeps the toast until removed.
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
}

/// Shared toast queue. Clones see the same list.
#[derive(Debug, Clone, Default)]
pub struct Notifications {
    inner: Arc<NotificationsInner>,
}

#[derive(Debug)]
struct NotificationsInner {
    toasts: watch::Sender<Vec<Toast>>,
    next_id: AtomicU64,
}

impl Default for NotificationsInner {
    fn default() -> Self {
        let (toasts, _) = watch::channel(Vec::new());
        Self {
            toasts,
            next_id: AtomicU64::new(1),
        }
    }
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a toast and return its id.
    ///
    /// `None` uses [`DEFAULT_TOAST_DURATION`]. A non-zero duration schedules
    /// removal on the current tokio runtime, when there is one.
    pub fn add(&self, message: impl Into<String>, kind: ToastKind, duration: Option<Duration>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let duration = duration.unwrap_or(DEFAULT_TOAST_DURATION);
        let toast = Toast {
            id,
            message: message.into(),
            kind,
            duration,
            created_at: Utc::now(),
        };
        self.inner.toasts.send_modify(|toasts| toasts.push(toast));

        if !duration.is_zero() {
            if let Ok(handle) = Handle::try_current() {
                let weak: Weak<NotificationsInner> = Arc::downgrade(&self.inner);
                handle.spawn(async move {
                    tokio::time::sleep(duration).await;
                    if let Some(inner) = weak.upgrade() {
                        Notifications { inner }.remove(id);
                    }
                });
            }
        }

        id
    }

    pub fn remove(&self, id: u64) {
        self.inner.toasts.send_if_modified(|toasts| {
            let before = toasts.len();
            toasts.retain(|t| t.id != id);
            toasts.len() != before
        });
    }

    pub fn clear(&self) {
        self.inner.toasts.send_if_modified(|toasts| {
            let changed = !toasts.is_empty();
            toasts.clear();
            changed
        });
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.inner.toasts.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.inner.toasts.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.add(message, ToastKind::Success, None)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.add(message, ToastKind::Error, None)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.add(message, ToastKind::Warning, None)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.add(message, ToastKind::Info, None)
    }
}
