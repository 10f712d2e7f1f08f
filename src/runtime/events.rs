//! Runtime event stream payloads.

use crate::types::EntryId;

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// The queue was replaced from storage.
    Reset {
        /// Entries kept after normalization.
        entries: usize,
    },
    /// A new entry was appended.
    Enqueued {
        /// New entry id.
        id: EntryId,
    },
    /// An entry became active and was handed to delivery.
    Activated {
        /// Active entry id.
        id: EntryId,
    },
    /// An entry was delivered.
    Succeeded {
        /// Delivered entry id.
        id: EntryId,
    },
    /// An entry failed and now waits for a manual retry.
    Failed {
        /// Failed entry id.
        id: EntryId,
        /// User-facing failure text.
        message: Option<String>,
    },
    /// A failed entry was put back into the queue.
    Retried {
        /// Retried entry id.
        id: EntryId,
    },
    /// A sync pass started.
    SyncStarted,
    /// A sync pass found nothing left to send.
    SyncFinished,
    /// Reachability changed.
    ConnectivityChanged {
        /// New reachability.
        connected: bool,
    },
    /// The queue was written to storage.
    Persisted {
        /// Entries written.
        entries: usize,
    },
    /// Writing the queue failed.
    PersistFailed {
        /// Error text.
        message: String,
    },
    /// The permit invalidation hook was called.
    PermitsInvalidated,
}
