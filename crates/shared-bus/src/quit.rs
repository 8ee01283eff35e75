//! The single broadcast "quit" signal every stage selects on (§5).
//!
//! Mirrors the teacher's choreography pattern of one shared primitive rather
//! than each stage inventing its own shutdown channel: `tokio::sync::watch`
//! closes exactly once and every clone of [`QuitWatch`] observes it, which is
//! what §5 calls "a single broadcast quit boolean channel (closed once)".

use tokio::sync::watch;

/// Owned by the top-level runtime; calling [`QuitSignal::trigger`] is the
/// only way the process asks every stage to stop.
pub struct QuitSignal {
    tx: watch::Sender<bool>,
}

/// Held by every pipeline stage; `changed()`/`borrow()` form the "priority
/// select alongside the primary channel" §5 describes.
#[derive(Clone)]
pub struct QuitWatch {
    rx: watch::Receiver<bool>,
}

impl QuitSignal {
    pub fn new() -> (Self, QuitWatch) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, QuitWatch { rx })
    }

    /// Broadcast the quit signal. Idempotent: triggering twice is a no-op.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl QuitWatch {
    /// `true` once [`QuitSignal::trigger`] has been called.
    pub fn is_quitting(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once quit has been triggered. Safe to `select!` against a
    /// stage's primary receive.
    pub async fn wait(&mut self) {
        if self.is_quitting() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let (signal, mut watch) = QuitSignal::new();
        assert!(!watch.is_quitting());

        signal.trigger();
        watch.wait().await;
        assert!(watch.is_quitting());
    }

    #[tokio::test]
    async fn clones_observe_the_same_signal() {
        let (signal, watch) = QuitSignal::new();
        let watch2 = watch.clone();
        signal.trigger();
        assert!(watch.is_quitting());
        assert!(watch2.is_quitting());
    }
}
