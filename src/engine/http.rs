//! HTTP multipart implementation of [`SubmissionTransport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::{config::TransportConfig, edit::EditResponse};

use super::traits::{EditPayload, SubmissionTransport, TransportError};

const MAX_LOG_BODY_CHARS: usize = 512;

/// Posts submissions as `multipart/form-data` with an `edits` text part and
/// an optional `files` part.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|err| TransportError::Message(err.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            url: config.apply_edits_url(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SubmissionTransport for HttpTransport {
    async fn apply_edits(&self, payload: EditPayload) -> Result<Vec<EditResponse>, TransportError> {
        let mut form = Form::new().text("edits", payload.edits_json);
        if let Some(photo) = payload.photo {
            let part = Part::bytes(photo.bytes)
                .file_name(photo.file_name)
                .mime_str(&photo.mime)?;
            form = form.part("files", part);
        }

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let preview: String = body.chars().take(MAX_LOG_BODY_CHARS).collect();
            debug!(status = status.as_u16(), body = %preview, "apply edits failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}
