use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    edit::{Edit, PhotoReference},
    engine::{
        messages::{ErrorMessageCatalog, classify_rejection},
        photo::resolve_photo,
        traits::{EditPayload, SubmissionTransport},
    },
    op::Transition,
    types::{EntryId, REQUEST_ALREADY_PROCESSED},
};

/// Why a delivery did not succeed. Both fields are empty for transport-level
/// failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl DeliveryFailure {
    pub fn transport() -> Self {
        Self::default()
    }

    pub fn rejected(code: i64, message: Option<String>) -> Self {
        Self {
            code: Some(code),
            message,
        }
    }

    /// The remote side already applied this submission earlier.
    pub fn is_already_processed(&self) -> bool {
        self.code == Some(REQUEST_ALREADY_PROCESSED)
    }
}

pub type DeliveryOutcome = Result<(), DeliveryFailure>;

/// One entry's edits on their way to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub entry_id: EntryId,
    pub edits: Vec<Edit>,
    pub photo: Option<PhotoReference>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyEditsState {
    Idle,
    Loading(Submission),
    Success,
    Failure { error: Option<DeliveryFailure> },
}

/// Transient state machine for one in-flight submission:
/// `idle -> loading -> success | failure`, `failure -> loading` on retry,
/// and back to `idle` on reset.
#[derive(Debug, Clone)]
pub struct ApplyEdits {
    state: ApplyEditsState,
}

impl Default for ApplyEdits {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplyEdits {
    pub fn new() -> Self {
        Self {
            state: ApplyEditsState::Idle,
        }
    }

    pub fn state(&self) -> &ApplyEditsState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ApplyEditsState::Loading(_))
    }

    /// Entry currently being delivered.
    pub fn loading_entry(&self) -> Option<EntryId> {
        match &self.state {
            ApplyEditsState::Loading(submission) => Some(submission.entry_id),
            _ => None,
        }
    }

    /// Starts a delivery. Ignored unless idle.
    pub fn submit(&mut self, submission: Submission) -> Transition {
        if !matches!(self.state, ApplyEditsState::Idle) {
            return Transition::Ignored;
        }
        self.state = ApplyEditsState::Loading(submission);
        Transition::Applied
    }

    /// Restarts a failed delivery.
    pub fn retry(&mut self, submission: Submission) -> Transition {
        if !matches!(self.state, ApplyEditsState::Failure { .. }) {
            return Transition::Ignored;
        }
        self.state = ApplyEditsState::Loading(submission);
        Transition::Applied
    }

    /// Records the outcome for `entry_id`. Ignored unless that entry is the
    /// one loading.
    pub fn complete(&mut self, entry_id: EntryId, outcome: DeliveryOutcome) -> Transition {
        if self.loading_entry() != Some(entry_id) {
            return Transition::Ignored;
        }
        self.state = match outcome {
            Ok(()) => ApplyEditsState::Success,
            Err(error) => ApplyEditsState::Failure { error: Some(error) },
        };
        Transition::Applied
    }

    pub fn reset(&mut self) {
        self.state = ApplyEditsState::Idle;
    }
}

/// Performs the network half of a submission: payload encoding, photo
/// resolution, the transport call and rejection classification.
pub struct Deliverer {
    transport: Arc<dyn SubmissionTransport>,
    catalog: ErrorMessageCatalog,
    language: String,
}

impl Deliverer {
    pub fn new(
        transport: Arc<dyn SubmissionTransport>,
        catalog: ErrorMessageCatalog,
        language: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            catalog,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    #[instrument(skip_all, fields(entry_id = %submission.entry_id, edits = submission.edits.len()))]
    pub async fn deliver(&self, submission: &Submission) -> DeliveryOutcome {
        info!("applying edits");
        let edits_json = serde_json::to_string(&submission.edits).map_err(|err| {
            warn!(error = %err, "failed to encode edits");
            DeliveryFailure::transport()
        })?;

        let photo = match &submission.photo {
            Some(photo) => Some(resolve_photo(photo).await.map_err(|err| {
                warn!(error = %err, "failed to resolve photo");
                DeliveryFailure::transport()
            })?),
            None => None,
        };

        let responses = self
            .transport
            .apply_edits(EditPayload { edits_json, photo })
            .await
            .map_err(|err| {
                warn!(error = %err, "failed to apply edits");
                DeliveryFailure::transport()
            })?;

        // Only the first rejection is reported.
        match responses.iter().find_map(|response| response.error.as_ref()) {
            Some(error) => {
                let failure = classify_rejection(error, &self.catalog, &self.language);
                warn!(code = error.code, message = ?failure.message, "edits rejected");
                Err(failure)
            }
            None => {
                info!("edits applied");
                Ok(())
            }
        }
    }
}
