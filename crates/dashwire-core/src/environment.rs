// ── Host environment signals ──
//
// Connectivity and visibility as observable flags. Hosts flip them
// (network monitor, window focus, terminal suspend); the refresh scheduler
// only runs while both are set.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared online/visible signals. Clones observe the same flags.
#[derive(Debug, Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

#[derive(Debug)]
struct EnvironmentInner {
    online: watch::Sender<bool>,
    visible: watch::Sender<bool>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Online and visible.
    pub fn new() -> Self {
        let (online, _) = watch::channel(true);
        let (visible, _) = watch::channel(true);
        Self {
            inner: Arc::new(EnvironmentInner { online, visible }),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.inner.online.borrow()
    }

    pub fn is_visible(&self) -> bool {
        *self.inner.visible.borrow()
    }

    pub fn set_online(&self, online: bool) {
        set_flag(&self.inner.online, online);
    }

    pub fn set_visible(&self, visible: bool) {
        set_flag(&self.inner.visible, visible);
    }

    pub fn subscribe_online(&self) -> watch::Receiver<bool> {
        self.inner.online.subscribe()
    }

    pub fn subscribe_visible(&self) -> watch::Receiver<bool> {
        self.inner.visible.subscribe()
    }
}

/// Store `value`, notifying receivers only on an actual change.
pub(crate) fn set_flag(sender: &watch::Sender<bool>, value: bool) {
    sender.send_if_modified(|current| {
        if *current == value {
            return false;
        }
        *current = value;
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_online_and_visible() {
        let env = Environment::default();
        assert!(env.is_online());
        assert!(env.is_visible());
    }

    #[test]
    fn clones_share_state_and_only_real_changes_notify() {
        let env = Environment::new();
        let mut rx = env.subscribe_online();
        let other = env.clone();

        other.set_online(true);
        assert!(!rx.has_changed().unwrap_or(true));

        other.set_online(false);
        assert!(rx.has_changed().unwrap_or(false));
        assert!(!env.is_online());
    }
}
