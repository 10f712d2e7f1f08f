use async_trait::async_trait;
use thiserror::Error;

use crate::{edit::EditResponse, engine::photo::PhotoBlob};

/// Multipart body of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPayload {
    /// JSON array of edits, sent as the `edits` text part.
    pub edits_json: String,
    /// Photo sent as the `files` binary part.
    pub photo: Option<PhotoBlob>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

/// Sends one submission to the remote apply-edits operation.
#[async_trait]
pub trait SubmissionTransport: Send + Sync + 'static {
    async fn apply_edits(&self, payload: EditPayload) -> Result<Vec<EditResponse>, TransportError>;
}

/// Hook telling the host to refetch permits. Fire and forget.
pub trait PermitInvalidator: Send + Sync + 'static {
    fn invalidate_permits(&self);
}

impl<F> PermitInvalidator for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn invalidate_permits(&self) {
        self()
    }
}
