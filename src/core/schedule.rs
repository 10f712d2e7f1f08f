use crate::{
    core::state::{EditQueueState, QueueStatus},
    types::EntryId,
};

/// What the runtime should do next for a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Activate this pending entry.
    Start(EntryId),
    /// Hand this active entry to the delivery coordinator.
    Deliver(EntryId),
    /// Nothing left to send; finish the pass.
    Finish,
    /// Status says active but no entry is; reload from storage.
    Recover,
    /// Nothing to do until an external input arrives.
    Wait,
}

pub fn next_step(state: &EditQueueState) -> Step {
    match state.status {
        QueueStatus::Pending => match state.first_pending() {
            Some(entry) => Step::Start(entry.id),
            None => Step::Finish,
        },
        QueueStatus::Active => match state.active_entry() {
            Some(entry) => Step::Deliver(entry.id),
            None => Step::Recover,
        },
        QueueStatus::Idle | QueueStatus::Loading => Step::Wait,
    }
}
