//! Change notification.
//!
//! No store in this crate implements live watching. They all hand out the
//! same [`NoopWatcher`], which reports readiness immediately and never emits
//! anything else.

use std::sync::{Arc, LazyLock};

/// Events a watcher can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    /// Initial scan finished.
    Ready,
    /// File added.
    Add,
    /// Directory added.
    AddDir,
    /// File changed.
    Change,
    /// File removed.
    Unlink,
    /// Directory removed.
    UnlinkDir,
    /// Watcher failed.
    Error,
}

/// Listener callback. Receives the affected address, or `None` for `Ready`.
pub type WatchListener = Box<dyn FnMut(Option<&str>) + Send>;

/// Watcher over a set of addresses.
pub trait FsWatcher: Send + Sync {
    /// Register a listener for every occurrence of `event`.
    fn on(&self, event: WatchEvent, listener: WatchListener);

    /// Register a listener for the next occurrence of `event`.
    fn once(&self, event: WatchEvent, listener: WatchListener);

    /// Stop watching.
    fn close(&self);
}

/// Watcher for stores without change notification.
///
/// `Ready` listeners run synchronously inside `on`/`once`. Every other
/// listener is accepted and dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatcher;

impl FsWatcher for NoopWatcher {
    fn on(&self, event: WatchEvent, mut listener: WatchListener) {
        if event == WatchEvent::Ready {
            listener(None);
        }
    }

    fn once(&self, event: WatchEvent, listener: WatchListener) {
        self.on(event, listener);
    }

    fn close(&self) {}
}

static SHARED: LazyLock<Arc<NoopWatcher>> = LazyLock::new(|| Arc::new(NoopWatcher));

/// The shared no-op watcher instance.
pub fn noop_watcher() -> Arc<dyn FsWatcher> {
    SHARED.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ready_fires_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let watcher = noop_watcher();

        let seen = calls.clone();
        watcher.on(
            WatchEvent::Ready,
            Box::new(move |address| {
                assert!(address.is_none());
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let seen = calls.clone();
        watcher.once(
            WatchEvent::Ready,
            Box::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn other_events_never_fire() {
        let calls = Arc::new(AtomicUsize::new(0));
        let watcher = noop_watcher();

        for event in [WatchEvent::Add, WatchEvent::Change, WatchEvent::Unlink] {
            let seen = calls.clone();
            watcher.on(
                event,
                Box::new(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        watcher.close();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn shared_instance() {
        let a = noop_watcher();
        let b = noop_watcher();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
