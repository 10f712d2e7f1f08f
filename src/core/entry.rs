use serde::{Deserialize, Serialize};

use crate::{
    edit::{Attributes, Edit, PhotoReference},
    types::{EntryId, FeatureLayer},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntryState {
    Success,
    Pending,
    Active,
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl EntryState {
    pub fn is_pending(&self) -> bool {
        matches!(self, EntryState::Pending)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, EntryState::Active)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EntryState::Error { .. })
    }

    /// True for states that still need a delivery attempt.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, EntryState::Pending | EntryState::Active)
    }
}

/// User-visible unit of work: edits plus display metadata and delivery state.
///
/// Entries persisted before ids were introduced get a fresh id on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditQueueEntry {
    #[serde(default)]
    pub id: EntryId,
    pub title: String,
    pub icon: String,
    pub state: EntryState,
    pub edits: Vec<Edit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<PhotoReference>,
}

impl EditQueueEntry {
    /// Attributes of the first feature of the first edit.
    pub fn attributes(&self) -> Option<&Attributes> {
        self.edits.first().and_then(Edit::first_attributes)
    }

    /// Layer of the first edit.
    pub fn layer(&self) -> Option<FeatureLayer> {
        self.edits.first().map(|edit| edit.id)
    }
}

/// Caller-supplied content of an entry about to be enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub title: String,
    pub icon: String,
    pub edits: Vec<Edit>,
    pub photo: Option<PhotoReference>,
}

impl NewEntry {
    pub fn new(title: impl Into<String>, icon: impl Into<String>, edits: Vec<Edit>) -> Self {
        Self {
            title: title.into(),
            icon: icon.into(),
            edits,
            photo: None,
        }
    }

    pub fn with_photo(mut self, photo: PhotoReference) -> Self {
        self.photo = Some(photo);
        self
    }

    /// Materializes a `pending` entry with a freshly generated id.
    pub fn into_entry(self) -> EditQueueEntry {
        EditQueueEntry {
            id: EntryId::generate(),
            title: self.title,
            icon: self.icon,
            state: EntryState::Pending,
            edits: self.edits,
            photo: self.photo,
        }
    }
}
