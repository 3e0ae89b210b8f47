//! Image content-type detection.

pub const DEFAULT_MIME: &str = "image/jpeg";

/// Determine the MIME type of an image. Always returns an `image/*` type.
///
/// Recognised byte signatures win over the extension of `name`, since the
/// bytes are what the vision model will actually decode. Without a
/// recognisable signature the extension is used, then `image/jpeg`.
pub fn sniff(name: &str, bytes: Option<&[u8]>) -> String {
    if let Some(mime) = bytes.and_then(from_signature) {
        return mime.to_string();
    }

    if let Some(mime) = from_extension(name) {
        return mime;
    }

    DEFAULT_MIME.to_string()
}

/// Extension-based guess, accepted only for `image/*` types.
pub fn from_extension(name: &str) -> Option<String> {
    mime_guess::from_path(name)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
}

/// Magic-number detection, accepted only for image formats. A RIFF/WAVE
/// or PDF payload yields `None` rather than a non-image type.
pub fn from_signature(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
}

/// Normalise an HTTP `Content-Type` header value, keeping it only when it
/// names an image type.
pub fn from_content_type(header: &str) -> Option<String> {
    let essence = header.split(';').next()?.trim().to_ascii_lowercase();
    (essence.starts_with("image/") && essence.len() > "image/".len()).then_some(essence)
}
