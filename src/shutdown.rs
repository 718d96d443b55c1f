//! Cooperative shutdown token.
//!
//! A single [`Shutdown`] is created when the server starts and cloned into
//! every task: the accept loop, the expiry sweeper and each connection
//! handler. Each of them waits on [`Shutdown::cancelled`] alongside its own
//! suspension point and exits once the token fires.
//!
//! Nothing is forcibly aborted. A task in the middle of a request finishes
//! that exchange before it observes the token.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable, one-shot cancellation token.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the token. Calling it more than once has no further effect.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once [`trigger`](Self::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once the token has fired, immediately if it already has.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}
