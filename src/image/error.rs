use std::path::PathBuf;

use thiserror::Error;

use super::path::RootAttempt;

/// Failure of a single loader while resolving an image reference.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("malformed image input: {0}")]
    MalformedInput(String),

    #[error("Image file not found: {path} ({attempt})")]
    NotFound { path: String, attempt: RootAttempt },

    #[error("Permission denied when trying to read image file at: {}", .path.display())]
    AccessDenied { path: PathBuf },

    /// `status` is 0 when the request never produced an HTTP response.
    #[error("Failed to download image from URL: {url}, error: {message}")]
    FetchFailed {
        status: u16,
        url: String,
        message: String,
    },

    #[error(
        "could not interpret {reference:?} as a URL, base64 data, data URL, or readable image file: {reason}"
    )]
    Unclassifiable { reference: String, reason: String },
}
