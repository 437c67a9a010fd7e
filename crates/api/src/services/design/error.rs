//! Error types for image generation and storage.

use thiserror::Error;

/// Errors from the image-generation API or the storage backend.
#[derive(Debug, Error)]
pub enum DesignError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The image API returned an error status.
    #[error("image API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The storage API returned an error status.
    #[error("storage error ({status}): {message}")]
    Storage { status: u16, message: String },

    /// Failed to parse a response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Image payload was not valid base64.
    #[error("invalid image payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Writing to local storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error body returned by the image API.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}
