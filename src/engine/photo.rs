use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

use crate::edit::PhotoReference;

/// MIME type assumed when a reference does not state one.
pub const DEFAULT_PHOTO_MIME: &str = "image/jpg";

/// Photo bytes ready to attach to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("failed to read photo {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid base64 photo: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("malformed data url")]
    MalformedDataUrl,
}

/// Resolves a [`PhotoReference`] to bytes. File references are read from disk;
/// embedded strings are base64-decoded after stripping any `data:` prefix.
pub async fn resolve_photo(photo: &PhotoReference) -> Result<PhotoBlob, PhotoError> {
    match photo {
        PhotoReference::Embedded(data) => decode_embedded(data),
        PhotoReference::File { path, .. } => {
            let bytes = tokio::fs::read(path).await.map_err(|source| PhotoError::Read {
                path: path.clone(),
                source,
            })?;
            let file_name = std::path::Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo.jpg".to_string());
            Ok(PhotoBlob {
                bytes,
                mime: DEFAULT_PHOTO_MIME.to_string(),
                file_name,
            })
        }
    }
}

pub fn decode_embedded(data: &str) -> Result<PhotoBlob, PhotoError> {
    let (mime, encoded) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, encoded) = rest.split_once(',').ok_or(PhotoError::MalformedDataUrl)?;
            let mime = header.split(';').next().filter(|m| !m.is_empty());
            (mime.unwrap_or(DEFAULT_PHOTO_MIME), encoded)
        }
        None => (DEFAULT_PHOTO_MIME, data),
    };
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(PhotoBlob {
        bytes,
        mime: mime.to_string(),
        file_name: "photo.jpg".to_string(),
    })
}
