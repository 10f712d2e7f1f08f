use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    core::entry::{EditQueueEntry, EntryState},
    op::{QueueAction, Transition},
    types::{EntryId, FeatureLayer},
};

/// Aggregate queue status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Before the first load from storage completed.
    Loading,
    Idle,
    Pending,
    Active,
}

/// Progress of the last enqueue as seen by the submitting form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddToQueueStatus {
    Idle,
    Loading,
    Success,
    Failure,
}

/// Authoritative queue state owned by the runtime loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditQueueState {
    pub status: QueueStatus,
    pub queue: Vec<EditQueueEntry>,
    pub add_to_queue_status: AddToQueueStatus,
    pub reload_permits: bool,
}

impl Default for EditQueueState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditQueueState {
    pub fn new() -> Self {
        Self {
            status: QueueStatus::Loading,
            queue: Vec::new(),
            add_to_queue_status: AddToQueueStatus::Idle,
            reload_permits: false,
        }
    }

    /// Idle state holding `queue` as-is.
    pub fn with_queue(queue: Vec<EditQueueEntry>) -> Self {
        Self {
            status: QueueStatus::Idle,
            queue,
            ..Self::new()
        }
    }

    pub fn entry(&self, id: EntryId) -> Option<&EditQueueEntry> {
        self.queue.iter().find(|entry| entry.id == id)
    }

    pub fn active_entry(&self) -> Option<&EditQueueEntry> {
        self.queue.iter().find(|entry| entry.state.is_active())
    }

    /// First pending entry in queue order.
    pub fn first_pending(&self) -> Option<&EditQueueEntry> {
        self.queue.iter().find(|entry| entry.state.is_pending())
    }

    pub fn active_count(&self) -> usize {
        self.queue.iter().filter(|entry| entry.state.is_active()).count()
    }

    /// Returns the permit reload flag and clears it.
    pub fn take_reload_permits(&mut self) -> bool {
        std::mem::take(&mut self.reload_permits)
    }

    /// Applies one action. Actions that are not valid for the current status
    /// or target an entry in the wrong state leave the state untouched.
    pub fn apply(&mut self, action: QueueAction) -> Transition {
        match (self.status, action) {
            (_, QueueAction::Reset { queue }) => {
                self.status = QueueStatus::Idle;
                self.queue = queue;
                Transition::Applied
            }
            (QueueStatus::Loading, QueueAction::Enqueue { .. }) => Transition::Ignored,
            (_, QueueAction::Enqueue { mut entry }) => {
                entry.state = EntryState::Pending;
                self.queue.push(entry);
                self.add_to_queue_status = AddToQueueStatus::Success;
                Transition::Applied
            }
            (_, QueueAction::AcknowledgeAdd) => match self.add_to_queue_status {
                AddToQueueStatus::Success | AddToQueueStatus::Failure => {
                    self.add_to_queue_status = AddToQueueStatus::Idle;
                    Transition::Applied
                }
                AddToQueueStatus::Idle | AddToQueueStatus::Loading => Transition::Ignored,
            },
            (QueueStatus::Idle, QueueAction::StartSync) => {
                info!(entries = self.queue.len(), "edit queue sync started");
                self.status = QueueStatus::Pending;
                Transition::Applied
            }
            (_, QueueAction::StartSync) => Transition::Ignored,
            (QueueStatus::Pending, QueueAction::SyncStart { id })
            | (QueueStatus::Idle, QueueAction::ManualStart { id }) => self.activate(id),
            (_, QueueAction::SyncStart { .. } | QueueAction::ManualStart { .. }) => {
                Transition::Ignored
            }
            (QueueStatus::Active, QueueAction::SyncSuccess { id }) => {
                let Some(layer) = self.settle_active(id, EntryState::Success) else {
                    return Transition::Ignored;
                };
                if layer == Some(FeatureLayer::LimitedHuntReport) {
                    self.reload_permits = !self.queue.iter().any(|entry| {
                        entry.layer() == Some(FeatureLayer::LimitedHuntReport)
                            && entry.state.is_outstanding()
                    });
                } else {
                    self.reload_permits = false;
                }
                self.status = QueueStatus::Pending;
                Transition::Applied
            }
            (QueueStatus::Active, QueueAction::SyncError { id, message }) => {
                if self
                    .settle_active(id, EntryState::Error { error: message })
                    .is_none()
                {
                    return Transition::Ignored;
                }
                self.reload_permits = false;
                self.status = QueueStatus::Pending;
                Transition::Applied
            }
            (_, QueueAction::SyncSuccess { .. } | QueueAction::SyncError { .. }) => {
                Transition::Ignored
            }
            (QueueStatus::Pending | QueueStatus::Active, QueueAction::SyncFinished) => {
                info!("edit queue sync finished");
                self.status = QueueStatus::Idle;
                self.reload_permits = false;
                Transition::Applied
            }
            (_, QueueAction::SyncFinished) => Transition::Ignored,
            (status, QueueAction::RetryFailed { id }) => {
                let Some(entry) = self
                    .queue
                    .iter_mut()
                    .find(|entry| entry.id == id && entry.state.is_error())
                else {
                    return Transition::Ignored;
                };
                entry.state = EntryState::Pending;
                if status == QueueStatus::Idle {
                    self.status = QueueStatus::Pending;
                }
                Transition::Applied
            }
        }
    }

    fn activate(&mut self, id: EntryId) -> Transition {
        if self.active_entry().is_some() {
            return Transition::Ignored;
        }
        let Some(entry) = self
            .queue
            .iter_mut()
            .find(|entry| entry.id == id && entry.state.is_pending())
        else {
            return Transition::Ignored;
        };
        entry.state = EntryState::Active;
        self.status = QueueStatus::Active;
        Transition::Applied
    }

    /// Moves the active entry `id` to `next`. Returns the entry's layer, or
    /// `None` when `id` is not the active entry.
    fn settle_active(&mut self, id: EntryId, next: EntryState) -> Option<Option<FeatureLayer>> {
        let entry = self
            .queue
            .iter_mut()
            .find(|entry| entry.id == id && entry.state.is_active())?;
        entry.state = next;
        Some(entry.layer())
    }
}
