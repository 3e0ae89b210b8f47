use thiserror::Error;

use crate::image::ImageError;

/// Guidance appended to every image-processing failure so the caller can
/// correct the reference on the next attempt.
const IMAGE_INPUT_GUIDANCE: &str = "Make sure your image is specified correctly:
- For file paths, try providing the full absolute path
- For relative paths, specify the project_root parameter
- For URLs, ensure they are publicly accessible
- For base64, ensure the encoding is correct
- For data URLs, use the form data:image/png;base64,<payload>

Examples:
image_analysis(image=\"/full/path/to/image.jpg\", query=\"Describe this image\")
image_analysis(image=\"relative/path/image.jpg\", project_root=\"/root/dir\", query=\"What's in this image?\")
image_analysis(image=\"https://example.com/image.jpg\", query=\"Analyze this image\")";

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid parameter: {0}")]
    InvalidParams(String),

    #[error("Failed to process image: {0}\n\n{}", IMAGE_INPUT_GUIDANCE)]
    ImageProcessing(#[from] ImageError),

    #[error("OpenRouter API error ({status}): {body}")]
    RemoteService { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),
}

pub type Result<T> = std::result::Result<T, VisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_processing_message_carries_cause_and_guidance() {
        let err = VisionError::from(ImageError::MalformedInput(
            "data URL has no base64 payload".into(),
        ));
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to process image: "));
        assert!(msg.contains("data URL has no base64 payload"));
        assert!(msg.contains("project_root"));
        assert!(msg.contains("https://example.com/image.jpg"));
        assert!(msg.contains("base64"));
    }

    #[test]
    fn remote_service_message_includes_status() {
        let err = VisionError::RemoteService {
            status: 401,
            body: "invalid key".into(),
        };
        assert_eq!(err.to_string(), "OpenRouter API error (401): invalid key");
    }
}
