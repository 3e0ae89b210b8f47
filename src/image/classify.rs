use std::sync::LazyLock;

use data_encoding::{BASE64, Encoding};
use reqwest::Url;

/// Standard base64 that ignores non-zero trailing bits, so `SGVsbG8gV29ybGR=`
/// decodes the same as `SGVsbG8gV29ybGQ=`.
pub static LENIENT_BASE64: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = BASE64.specification();
    spec.check_trailing_bits = false;
    spec.encoding().unwrap_or_else(|_| BASE64.clone())
});

/// The four accepted shapes of an image reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSourceKind {
    DataUrl,
    Base64,
    RemoteUrl,
    FilesystemPath,
}

impl ImageSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSourceKind::DataUrl => "data_url",
            ImageSourceKind::Base64 => "base64",
            ImageSourceKind::RemoteUrl => "remote_url",
            ImageSourceKind::FilesystemPath => "filesystem_path",
        }
    }
}

/// Decide what kind of reference `reference` is. Total: anything that is not
/// recognisably inline data or a URL is treated as a filesystem path.
///
/// The checks run in a fixed order so a string can only ever match one kind:
/// data URLs first, then bare base64 (which can never contain `:`), then URLs.
pub fn classify(reference: &str) -> ImageSourceKind {
    if reference.starts_with("data:image") {
        ImageSourceKind::DataUrl
    } else if is_base64(reference) {
        ImageSourceKind::Base64
    } else if is_remote_url(reference) {
        ImageSourceKind::RemoteUrl
    } else {
        ImageSourceKind::FilesystemPath
    }
}

/// Standard-alphabet base64 with at most two `=` of padding, at least four
/// characters long, that actually decodes.
pub fn is_base64(s: &str) -> bool {
    if s.len() < 4 {
        return false;
    }

    let body = s.trim_end_matches('=');
    if s.len() - body.len() > 2 {
        return false;
    }

    if !body
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
    {
        return false;
    }

    LENIENT_BASE64.decode(s.as_bytes()).is_ok()
}

/// A URL with both a scheme and a network location written as `//host`.
/// `example.com`, `http:example.com` and `C:\img.png` are not URLs.
pub fn is_remote_url(s: &str) -> bool {
    // The parser would otherwise supply a host for `http:example.com`.
    let has_authority = s
        .split_once(':')
        .is_some_and(|(_, rest)| rest.starts_with("//"));
    if !has_authority {
        return false;
    }

    match Url::parse(s) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}
