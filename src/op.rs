//! Queue actions consumed by the transition table.

use crate::{core::entry::EditQueueEntry, types::EntryId};

/// One input to [`crate::core::state::EditQueueState::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueueAction {
    /// Replace the whole queue with an already normalized one.
    Reset {
        /// New queue contents.
        queue: Vec<EditQueueEntry>,
    },
    /// Append a new entry in `pending` state.
    Enqueue {
        /// Entry to append.
        entry: EditQueueEntry,
    },
    /// Return the add-to-queue status to `idle`.
    AcknowledgeAdd,
    /// Begin a sync pass from `idle`.
    StartSync,
    /// Activate the scheduler's chosen pending entry.
    SyncStart {
        /// Entry to activate.
        id: EntryId,
    },
    /// Activate a pending entry out of order while the queue is idle.
    ManualStart {
        /// Entry to activate.
        id: EntryId,
    },
    /// The active entry was delivered.
    SyncSuccess {
        /// Delivered entry.
        id: EntryId,
    },
    /// The active entry was rejected or could not be sent.
    SyncError {
        /// Failed entry.
        id: EntryId,
        /// User-facing failure text, if any.
        message: Option<String>,
    },
    /// No pending entries remain.
    SyncFinished,
    /// Put a failed entry back into `pending`.
    RetryFailed {
        /// Entry to retry.
        id: EntryId,
    },
}

impl QueueAction {
    /// True when applying the action can change queue contents rather than
    /// only the aggregate status.
    pub fn changes_queue(&self) -> bool {
        match self {
            QueueAction::Reset { .. }
            | QueueAction::Enqueue { .. }
            | QueueAction::SyncStart { .. }
            | QueueAction::ManualStart { .. }
            | QueueAction::SyncSuccess { .. }
            | QueueAction::SyncError { .. }
            | QueueAction::RetryFailed { .. } => true,
            QueueAction::AcknowledgeAdd | QueueAction::StartSync | QueueAction::SyncFinished => {
                false
            }
        }
    }
}

/// Outcome of applying a [`QueueAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed.
    Applied,
    /// Action not valid in the current state; nothing changed.
    Ignored,
}

impl Transition {
    /// True for [`Transition::Applied`].
    pub fn is_applied(self) -> bool {
        matches!(self, Transition::Applied)
    }
}
