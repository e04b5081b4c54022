// ── Refresh scheduler ──
//
// A registry of keyed polling callbacks driven by one shared timer. The
// timer only ticks while refresh is enabled, the host is online and
// visible, and at least one callback is registered. A cycle runs every
// callback concurrently; failures are logged per callback and never
// escalate.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::environment::{Environment, set_flag};

pub const MIN_INTERVAL_SECS: u64 = 5;
pub const MAX_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Outcome of one refresh callback.
pub type RefreshResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A registered refresh callback.
pub type RefreshHandler = Arc<dyn Fn() -> BoxFuture<'static, RefreshResult> + Send + Sync>;

/// Clamp a requested interval into `[5, 60]` seconds.
///
/// Rounds first. Values of 5000 and above are read as milliseconds from
/// older settings and divided by 1000 once. Non-finite input falls back to
/// the default.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::as_conversions
)]
pub fn normalize_interval_secs(value: f64) -> u64 {
    if !value.is_finite() {
        return DEFAULT_INTERVAL_SECS;
    }

    let mut next = value.round();
    if next >= (MIN_INTERVAL_SECS * 1000) as f64 {
        next = (next / 1000.0).round();
    }

    next.clamp(MIN_INTERVAL_SECS as f64, MAX_INTERVAL_SECS as f64) as u64
}

// ── Settings ────────────────────────────────────────────────────────

/// Persisted refresh configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub enabled: bool,
    /// Any number is accepted on input and normalised while reading.
    #[serde(deserialize_with = "deserialize_interval")]
    pub interval_seconds: u64,
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    f64::deserialize(deserializer).map(normalize_interval_secs)
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl RefreshSettings {
    /// Same settings with the interval normalised.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn normalized(self) -> Self {
        Self {
            interval_seconds: normalize_interval_secs(self.interval_seconds as f64),
            ..self
        }
    }
}

/// Options for [`RefreshScheduler::register`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    /// Run the callback once right away, outside the regular cadence.
    pub immediate: bool,
}

// ── Scheduler ───────────────────────────────────────────────────────

/// Shared-timer polling registry. Cheaply cloneable.
///
/// Call [`start`](Self::start) from inside a runtime to spawn the timer and
/// [`shutdown`](Self::shutdown) to stop it.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    environment: Environment,
    enabled: watch::Sender<bool>,
    interval_secs: watch::Sender<u64>,
    subscribers: DashMap<String, RefreshHandler>,
    subscriber_count: watch::Sender<usize>,
    refreshing: AtomicBool,
    last_refreshed_at: watch::Sender<Option<DateTime<Utc>>>,
    cancel: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(settings: RefreshSettings, environment: Environment) -> Self {
        let settings = settings.normalized();
        let (enabled, _) = watch::channel(settings.enabled);
        let (interval_secs, _) = watch::channel(settings.interval_seconds);
        let (subscriber_count, _) = watch::channel(0);
        let (last_refreshed_at, _) = watch::channel(None);

        Self {
            inner: Arc::new(SchedulerInner {
                environment,
                enabled,
                interval_secs,
                subscribers: DashMap::new(),
                subscriber_count,
                refreshing: AtomicBool::new(false),
                last_refreshed_at,
                cancel: CancellationToken::new(),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Spawn the shared timer. Calling it again is a no-op.
    pub fn start(&self) {
        let mut timer = self.inner.timer.lock().expect("timer lock poisoned");
        if timer.is_some() {
            return;
        }
        let scheduler = self.clone();
        let cancel = self.inner.cancel.clone();
        *timer = Some(tokio::spawn(timer_task(scheduler, cancel)));
    }

    /// Stop the shared timer. Registered callbacks stay registered.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.timer.lock().expect("timer lock poisoned").take() {
            handle.abort();
        }
    }

    // ── Configuration ────────────────────────────────────────────

    pub fn settings(&self) -> RefreshSettings {
        RefreshSettings {
            enabled: self.is_enabled(),
            interval_seconds: self.interval_secs(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.inner.enabled.borrow()
    }

    pub fn set_enabled(&self, enabled: bool) {
        set_flag(&self.inner.enabled, enabled);
    }

    pub fn interval_secs(&self) -> u64 {
        *self.inner.interval_secs.borrow()
    }

    /// Set the interval, normalised. Returns the stored value.
    pub fn set_interval_secs(&self, value: f64) -> u64 {
        let next = normalize_interval_secs(value);
        self.inner.interval_secs.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        next
    }

    pub fn subscribe_enabled(&self) -> watch::Receiver<bool> {
        self.inner.enabled.subscribe()
    }

    pub fn subscribe_interval(&self) -> watch::Receiver<u64> {
        self.inner.interval_secs.subscribe()
    }

    // ── State ────────────────────────────────────────────────────

    /// Enabled, online and visible.
    pub fn is_active(&self) -> bool {
        self.is_enabled()
            && self.inner.environment.is_online()
            && self.inner.environment.is_visible()
    }

    /// Active with at least one subscriber: the timer is ticking.
    pub fn should_run(&self) -> bool {
        self.is_active() && self.has_subscribers()
    }

    pub fn has_subscribers(&self) -> bool {
        !self.inner.subscribers.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire)
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_refreshed_at.borrow()
    }

    pub fn subscribe_last_refreshed(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.last_refreshed_at.subscribe()
    }

    // ── Registry ─────────────────────────────────────────────────

    /// Install (or replace) the callback for `key`.
    ///
    /// A blank key is ignored and yields `None`.
    pub fn register<F, Fut>(
        &self,
        key: &str,
        handler: F,
        options: RegisterOptions,
    ) -> Option<Subscription>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RefreshResult> + Send + 'static,
    {
        if key.trim().is_empty() {
            return None;
        }

        let handler: RefreshHandler = Arc::new(move || handler().boxed());
        self.inner
            .subscribers
            .insert(key.to_owned(), Arc::clone(&handler));
        self.sync_subscriber_count();
        debug!(key, "refresh callback registered");

        if options.immediate {
            tokio::spawn(execute_handler(key.to_owned(), handler));
        }

        Some(Subscription {
            scheduler: Arc::downgrade(&self.inner),
            key: key.to_owned(),
        })
    }

    /// Remove the callback for `key`. Unknown keys are ignored.
    pub fn unregister(&self, key: &str) {
        unregister_in(&self.inner, key);
    }

    fn sync_subscriber_count(&self) {
        sync_subscriber_count_in(&self.inner);
    }

    // ── Cycle ────────────────────────────────────────────────────

    /// Run every registered callback once, concurrently.
    ///
    /// No-op while a cycle is already running or nothing is registered.
    pub async fn trigger_refresh(&self) {
        if self.inner.subscribers.is_empty() {
            return;
        }
        let Some(_busy) = BusyGuard::acquire(&self.inner.refreshing) else {
            debug!("refresh cycle already running");
            return;
        };

        let handlers: Vec<(String, RefreshHandler)> = self
            .inner
            .subscribers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        join_all(
            handlers
                .into_iter()
                .map(|(key, handler)| execute_handler(key, handler)),
        )
        .await;

        self.inner.last_refreshed_at.send_replace(Some(Utc::now()));
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("settings", &self.settings())
            .field("subscribers", &self.subscriber_count())
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

fn unregister_in(inner: &SchedulerInner, key: &str) {
    if inner.subscribers.remove(key).is_some() {
        sync_subscriber_count_in(inner);
        debug!(key, "refresh callback unregistered");
    }
}

fn sync_subscriber_count_in(inner: &SchedulerInner) {
    let count = inner.subscribers.len();
    inner.subscriber_count.send_if_modified(|current| {
        if *current == count {
            return false;
        }
        *current = count;
        true
    });
}

/// Handle returned by [`RefreshScheduler::register`].
#[derive(Debug)]
pub struct Subscription {
    scheduler: Weak<SchedulerInner>,
    key: String,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Same as `unregister(key)`.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.scheduler.upgrade() {
            unregister_in(&inner, &self.key);
        }
    }
}

/// Holds the busy flag for one cycle, releasing it even if the cycle is
/// dropped midway.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Run one callback on its own task so a panic is contained.
async fn execute_handler(key: String, handler: RefreshHandler) {
    match tokio::spawn(handler()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(key, error = %e, "refresh callback failed"),
        Err(e) => warn!(key, error = %e, "refresh callback panicked"),
    }
}

// ── Background timer ─────────────────────────────────────────────────

/// Watch the run predicate and interval; (re)start the ticker on change.
async fn timer_task(scheduler: RefreshScheduler, cancel: CancellationToken) {
    let inner = &scheduler.inner;
    let mut enabled = inner.enabled.subscribe();
    let mut interval_secs = inner.interval_secs.subscribe();
    let mut count = inner.subscriber_count.subscribe();
    let mut online = inner.environment.subscribe_online();
    let mut visible = inner.environment.subscribe_visible();

    let mut current: Option<Duration> = None;
    let mut ticker: Option<Interval> = None;

    loop {
        let desired = scheduler
            .should_run()
            .then(|| Duration::from_secs(scheduler.interval_secs()));
        if desired != current {
            current = desired;
            ticker = desired.map(|period| {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });
            debug!(period = ?current, "refresh timer reset");
        }

        let changed = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            res = enabled.changed() => res.is_ok(),
            res = interval_secs.changed() => res.is_ok(),
            res = count.changed() => res.is_ok(),
            res = online.changed() => res.is_ok(),
            res = visible.changed() => res.is_ok(),
            () = next_tick(&mut ticker) => {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.trigger_refresh().await });
                true
            }
        };
        if !changed {
            break;
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn scheduler(interval: u64) -> (RefreshScheduler, Environment) {
        let env = Environment::new();
        let scheduler = RefreshScheduler::new(
            RefreshSettings {
                enabled: true,
                interval_seconds: interval,
            },
            env.clone(),
        );
        (scheduler, env)
    }

    fn counter(scheduler: &RefreshScheduler, key: &str, options: RegisterOptions) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        scheduler.register(
            key,
            move || {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            options,
        );
        calls
    }

    /// Let spawned tasks run at the current (paused) instant.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn interval_normalisation() {
        assert_eq!(normalize_interval_secs(45_000.0), 45);
        assert_eq!(normalize_interval_secs(3.0), 5);
        assert_eq!(normalize_interval_secs(90.0), 60);
        assert_eq!(normalize_interval_secs(29.6), 30);
        assert_eq!(normalize_interval_secs(4_999.0), 60);
        assert_eq!(normalize_interval_secs(f64::NAN), DEFAULT_INTERVAL_SECS);
        assert_eq!(normalize_interval_secs(f64::INFINITY), DEFAULT_INTERVAL_SECS);
        assert_eq!(normalize_interval_secs(-12.0), 5);
    }

    #[test]
    fn settings_are_normalised_on_construction() {
        let (scheduler, _) = scheduler(10_000);
        assert_eq!(scheduler.interval_secs(), 10);
        assert_eq!(scheduler.set_interval_secs(0.0), 5);
    }

    #[test]
    fn active_requires_enabled_online_visible() {
        let (scheduler, env) = scheduler(30);
        assert!(scheduler.is_active());
        assert!(!scheduler.should_run());

        env.set_visible(false);
        assert!(!scheduler.is_active());
        env.set_visible(true);
        scheduler.set_enabled(false);
        assert!(!scheduler.is_active());
    }

    #[tokio::test]
    async fn blank_key_is_ignored() {
        let (scheduler, _) = scheduler(30);
        assert!(
            scheduler
                .register("  ", || async { Ok(()) }, RegisterOptions::default())
                .is_none()
        );
        assert!(!scheduler.has_subscribers());
        scheduler.unregister("missing");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_subscribers_never_run() {
        let (scheduler, _) = scheduler(5);
        scheduler.start();
        let calls = counter(&scheduler, "stats", RegisterOptions::default());
        scheduler.unregister("stats");

        tokio::time::sleep(Duration::from_secs(60)).await;
        scheduler.trigger_refresh().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(scheduler.last_refreshed_at().is_none());
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_after_one_full_interval() {
        let (scheduler, _) = scheduler(10);
        scheduler.start();
        let calls = counter(&scheduler, "stats", RegisterOptions::default());
        settle().await;

        tokio::time::sleep(Duration::from_secs(9)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(scheduler.last_refreshed_at().is_some());
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_host_pauses_the_timer() {
        let (scheduler, env) = scheduler(5);
        scheduler.start();
        let calls = counter(&scheduler, "stats", RegisterOptions::default());
        settle().await;

        env.set_visible(false);
        settle().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Restart: first tick one full interval after becoming visible.
        env.set_visible(true);
        settle().await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_runs_once_outside_cadence() {
        let (scheduler, _) = scheduler(30);
        let calls = counter(&scheduler, "stats", RegisterOptions { immediate: true });
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_callback() {
        let (scheduler, _) = scheduler(30);
        let calls = counter(&scheduler, "ok", RegisterOptions::default());
        scheduler.register(
            "err",
            || async { RefreshResult::Err("backend unavailable".into()) },
            RegisterOptions::default(),
        );
        scheduler.register(
            "panic",
            || async {
                let fail = true;
                if fail {
                    panic!("boom");
                }
                Ok(())
            },
            RegisterOptions::default(),
        );

        scheduler.trigger_refresh().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(scheduler.last_refreshed_at().is_some());
        assert!(!scheduler.is_refreshing());
    }

    #[tokio::test]
    async fn reregistering_replaces_and_unsubscribe_removes() {
        let (scheduler, _) = scheduler(30);
        let first = counter(&scheduler, "stats", RegisterOptions::default());
        let second = counter(&scheduler, "stats", RegisterOptions::default());
        assert_eq!(scheduler.subscriber_count(), 1);

        scheduler.trigger_refresh().await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        let sub = scheduler
            .register("logs", || async { Ok(()) }, RegisterOptions::default())
            .unwrap();
        assert_eq!(sub.key(), "logs");
        sub.unsubscribe();
        assert_eq!(scheduler.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycles_collapse_into_one() {
        let (scheduler, _) = scheduler(30);
        let gate = Arc::new(tokio::sync::Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (held, counted) = (Arc::clone(&gate), Arc::clone(&calls));
        scheduler.register(
            "slow",
            move || {
                let held = Arc::clone(&held);
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    held.notified().await;
                    Ok(())
                }
            },
            RegisterOptions::default(),
        );

        let running = scheduler.clone();
        let first = tokio::spawn(async move { running.trigger_refresh().await });
        settle().await;
        assert!(scheduler.is_refreshing());

        scheduler.trigger_refresh().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(scheduler.last_refreshed_at().is_none());

        gate.notify_one();
        first.await.unwrap();
        assert!(!scheduler.is_refreshing());
        assert!(scheduler.last_refreshed_at().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_restarts_the_timer() {
        let (scheduler, _) = scheduler(10);
        scheduler.start();
        let calls = counter(&scheduler, "stats", RegisterOptions::default());
        settle().await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(scheduler.set_interval_secs(20.0), 20);
        settle().await;

        // The old cadence would have fired at 10s and 20s.
        tokio::time::sleep(Duration::from_secs(19)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        scheduler.shutdown();
    }

    #[test]
    fn settings_accept_any_number() {
        let parsed: RefreshSettings =
            serde_json::from_str(r#"{"enabled":true,"interval_seconds":29.6}"#).unwrap();
        assert_eq!(parsed.interval_seconds, 30);
        let parsed: RefreshSettings =
            serde_json::from_str(r#"{"interval_seconds":-3}"#).unwrap();
        assert_eq!(parsed.interval_seconds, 5);
        let parsed: RefreshSettings =
            serde_json::from_str(r#"{"interval_seconds":45000}"#).unwrap();
        assert_eq!(parsed.interval_seconds, 45);
    }
}
