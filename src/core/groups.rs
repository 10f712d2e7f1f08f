use hashbrown::HashMap;

use crate::{
    core::entry::EditQueueEntry,
    types::LayerGroup,
};

/// Groups entries by the layer group of their first edit, keeping queue order
/// inside each group. Entries without edits are skipped.
pub fn group_by_kind(queue: &[EditQueueEntry]) -> HashMap<LayerGroup, Vec<&EditQueueEntry>> {
    let mut groups: HashMap<LayerGroup, Vec<&EditQueueEntry>> = HashMap::new();
    for entry in queue {
        if let Some(layer) = entry.layer() {
            groups.entry(layer.group()).or_default().push(entry);
        }
    }
    groups
}

/// True when no entry still waits for delivery.
pub fn is_queue_idle(queue: &[EditQueueEntry]) -> bool {
    !queue.iter().any(|entry| entry.state.is_outstanding())
}
