//! Response descriptor and header synthesis.

use std::fmt;
use std::fmt::Write as _;

use crate::parser::EOL;
use crate::server::mime::mime_for;

/// Protocol token written on every status line.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Page sent for unmatched routes when no `"404"` page is registered.
pub const PAGE_404: &str = "<!DOCTYPE html><html><head><title>404 Not Found</title></head>\
<body><h1>404 Not Found</h1><p>The requested page does not exist.</p></body></html>";

/// An HTTP status code. Handlers may set any value; it is sent verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const FOUND: StatusCode = StatusCode(302);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    /// Get the reason phrase for this status code.
    ///
    /// Codes outside the table read "Not Implemented".
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            302 => "Found",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            408 => "Request Timeout",
            413 => "Request-URI Too Long",
            500 => "Internal Error",
            503 => "Service Temporarily Overloaded",
            _ => "Not Implemented",
        }
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// Where the bytes of the current output chunk live.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Nothing to send.
    #[default]
    Empty,
    /// A chunk allocated for this call (header blocks, generated bodies).
    Owned(Vec<u8>),
    /// The chunk sits in the request's working buffer (storage reads).
    Buffer,
}

/// Response fields a handler can set, plus the chunk produced by the last
/// driver call.
#[derive(Debug, Default, Clone)]
pub struct Response {
    /// Status code; unset means 200 once a page matched.
    pub code: Option<StatusCode>,
    /// Content type; unset means resolved from the request path.
    pub mime: Option<String>,
    /// Extra header lines, written without their line terminator.
    pub headers: Vec<String>,
    /// Name of a file in the mounted image to stream as the body.
    pub file: Option<String>,
    /// Ownership tag of the current chunk.
    pub data: Chunk,
    /// Length of the current chunk.
    pub len: usize,
}

impl Response {
    /// Synthesizes the status line and header block, ending with the blank line.
    ///
    /// An unset content type is resolved from `path` for 200 and 404
    /// responses and left blank otherwise; a blank type omits the
    /// `Content-Type` line.
    pub fn header_block(&mut self, path: &str) -> String {
        let code = self.code.unwrap_or(StatusCode::OK);
        let mime = self.mime.get_or_insert_with(|| match code.0 {
            200 | 404 => mime_for(path).to_string(),
            _ => String::new(),
        });

        let mut header = String::with_capacity(64);
        let _ = write!(header, "{HTTP_VERSION} {} {}{EOL}", code.0, code.reason_phrase());
        if !mime.is_empty() {
            let _ = write!(header, "Content-Type: {mime}{EOL}");
        }
        for line in &self.headers {
            header.push_str(line);
            header.push_str(EOL);
        }
        header.push_str(EOL);
        header
    }
}

/// Canned HTML page for an error status.
pub fn error_page(code: StatusCode) -> String {
    let desc = code.reason_phrase();
    format!(
        "<!DOCTYPE html><html><head><title>{code} {desc}</title></head>\
         <body><h1>{code} {desc}</h1></body></html>",
        code = code.0
    )
}
