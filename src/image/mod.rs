//! Image reference resolution.
//!
//! Tools accept an image as an opaque string: a data URL, bare base64, a
//! remote URL, or a filesystem path (absolute, or relative to the working
//! directory or a caller-supplied project root). [`resolve_image`] works out
//! which one it is, loads the bytes, detects the content type, and returns a
//! [`ResolvedImage`] ready to embed in a chat-completions request.

mod classify;
mod error;
mod loader;
mod mime;
mod path;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ImageConfig;
use crate::error::Result;

pub use classify::{ImageSourceKind, classify};
pub use error::ImageError;

/// Base64 payload plus MIME type for one image. Transient: built for a
/// single request and dropped once the outbound payload exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub payload_base64: String,
    /// Always an `image/*` type.
    pub mime_type: String,
}

impl ResolvedImage {
    /// `data:<mime>;base64,<payload>`, the form vision APIs accept inline.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload_base64)
    }
}

/// Settings the resolver needs, taken from [`ImageConfig`] at startup.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub fetch_timeout: Duration,
    /// Used when a call does not name its own `project_root`.
    pub default_project_root: Option<PathBuf>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            default_project_root: None,
        }
    }
}

impl From<&ImageConfig> for ImageOptions {
    fn from(config: &ImageConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs.max(1)),
            default_project_root: (!config.default_project_root.is_empty())
                .then(|| PathBuf::from(&config.default_project_root)),
        }
    }
}

/// Resolve one image reference into a base64 payload and MIME type.
///
/// Loader failures are surfaced as [`VisionError::ImageProcessing`], whose
/// message lists the accepted input forms.
///
/// [`VisionError::ImageProcessing`]: crate::error::VisionError::ImageProcessing
pub async fn resolve_image(
    reference: &str,
    project_root: Option<&Path>,
    options: &ImageOptions,
    http: &reqwest::Client,
) -> Result<ResolvedImage> {
    let kind = classify(reference);
    let project_root = project_root.or(options.default_project_root.as_deref());

    debug!(
        kind = kind.as_str(),
        reference_len = reference.len(),
        project_root = ?project_root,
        "resolving image reference"
    );

    let resolved = match kind {
        ImageSourceKind::DataUrl => loader::load_data_url(reference),
        ImageSourceKind::Base64 => Ok(loader::load_base64(reference)),
        ImageSourceKind::RemoteUrl => {
            loader::fetch_remote(http, reference, options.fetch_timeout).await
        }
        ImageSourceKind::FilesystemPath => loader::load_file(reference, project_root).await,
    };

    match resolved {
        Ok(image) => {
            info!(
                kind = kind.as_str(),
                mime = %image.mime_type,
                payload_len = image.payload_base64.len(),
                "image processed"
            );
            Ok(image)
        }
        Err(e) => {
            warn!(kind = kind.as_str(), error = %e, "image processing failed");
            Err(e.into())
        }
    }
}
