use std::sync::Arc;

use tokio::sync::watch;

/// Publishes the device's network reachability to subscribers.
///
/// Rapid flaps between two reads may be observed as a single change.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(connected: bool) -> Self {
        let (tx, _) = watch::channel(connected);
        Self { tx: Arc::new(tx) }
    }

    /// Records the current reachability. Returns true if it changed.
    pub fn set_connected(&self, connected: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == connected {
                return false;
            }
            *current = connected;
            true
        })
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    /// New receiver seeing the current value; drop it to unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
