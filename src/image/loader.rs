use std::path::Path;
use std::time::Duration;

use data_encoding::BASE64;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use super::classify::LENIENT_BASE64;
use super::mime::{self, DEFAULT_MIME};
use super::path::PathCandidates;
use super::{ImageError, ResolvedImage};

/// `data:<mime>;base64,<payload>`: the payload is passed through untouched.
pub fn load_data_url(reference: &str) -> Result<ResolvedImage, ImageError> {
    let Some((_, payload)) = reference.split_once("base64,") else {
        return Err(ImageError::MalformedInput(
            "data URL is missing the `base64,` marker before its payload".into(),
        ));
    };

    let declared = reference
        .strip_prefix("data:")
        .and_then(|rest| rest.split([';', ',']).next())
        .unwrap_or_default();

    let mime_type = if declared.starts_with("image/") && declared.len() > "image/".len() {
        declared.to_string()
    } else {
        DEFAULT_MIME.to_string()
    };

    Ok(ResolvedImage {
        payload_base64: payload.to_string(),
        mime_type,
    })
}

/// Bare base64: passed through untouched, type sniffed from the decoded bytes.
pub fn load_base64(reference: &str) -> ResolvedImage {
    let decoded = LENIENT_BASE64.decode(reference.as_bytes()).ok();

    ResolvedImage {
        payload_base64: reference.to_string(),
        mime_type: mime::sniff("", decoded.as_deref()),
    }
}

/// Download a remote image. Any non-2xx status or transport failure is
/// reported as [`ImageError::FetchFailed`]; nothing is retried.
pub async fn fetch_remote(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<ResolvedImage, ImageError> {
    let fetch_failed = |status: u16, message: String| ImageError::FetchFailed {
        status,
        url: url.to_string(),
        message,
    };

    debug!(url, timeout_secs = timeout.as_secs(), "fetching remote image");

    let resp = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| fetch_failed(0, e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        warn!(url, status = %status, "remote image fetch failed");
        return Err(fetch_failed(status.as_u16(), format!("HTTP {status}")));
    }

    let header_mime = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(mime::from_content_type);
    let url_path = resp.url().path().to_string();

    let body = resp
        .bytes()
        .await
        .map_err(|e| fetch_failed(0, format!("reading response body: {e}")))?;

    let mime_type = header_mime.unwrap_or_else(|| mime::sniff(&url_path, Some(&body)));

    debug!(url, bytes = body.len(), mime = %mime_type, "remote image downloaded");

    Ok(ResolvedImage {
        payload_base64: BASE64.encode(&body),
        mime_type,
    })
}

/// Read a local image, trying the literal path and then `project_root`.
pub async fn load_file(
    reference: &str,
    project_root: Option<&Path>,
) -> Result<ResolvedImage, ImageError> {
    let candidates = PathCandidates::new(reference, project_root);
    debug!(
        candidates = ?candidates.paths(),
        attempt = %candidates.attempt(),
        "resolving image path"
    );

    let (found, bytes) = candidates.read_first(reference).await?;

    let mime_type = mime::sniff(&found.to_string_lossy(), Some(&bytes));

    Ok(ResolvedImage {
        payload_base64: BASE64.encode(&bytes),
        mime_type,
    })
}
