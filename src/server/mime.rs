//! Extension to content-type lookup.

/// Content type used when nothing else matches.
pub const DEFAULT_MIME: &str = "text/html";

const MIME_TYPES: &[(&str, &str)] = &[
    // Text
    ("html", "text/html"),
    ("htm", "text/html"),
    ("js", "text/javascript"),
    ("txt", "text/plain"),
    ("css", "text/css"),
    ("xml", "text/xml"),
    // Images
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    // Application
    ("json", "application/json"),
];

/// Resolves the content type for `path` from the text after its last `.`.
///
/// Paths without an extension, and unknown extensions, are `text/html`.
pub fn mime_for(path: &str) -> &'static str {
    let Some((_, ext)) = path.rsplit_once('.') else {
        return DEFAULT_MIME;
    };

    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map_or(DEFAULT_MIME, |(_, mime)| mime)
}
