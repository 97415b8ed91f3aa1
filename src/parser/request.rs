//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;
use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::params::param_value;
use crate::parser::version::HttpVersion;

/// Line terminator mandated for the request line.
pub const EOL: &str = "\r\n";

const HEAD_END: &str = "\r\n\r\n";

/// A structurally valid HTTP request.
///
/// The raw message is kept whole; query string and body are located on
/// demand as slices of it rather than copied out.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target as sent, including any query string
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// The complete raw request text
    pub message: String,
}

impl HttpRequest {
    /// The path with any `?query` suffix removed.
    pub fn plain_path(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(p, _)| p)
    }

    /// The query string following the first `?`, if any.
    pub fn query(&self) -> Option<&str> {
        self.path.split_once('?').map(|(_, q)| q)
    }

    /// Everything after the first blank line of the raw message, if any.
    pub fn body(&self) -> Option<&str> {
        self.message
            .find(HEAD_END)
            .map(|pos| &self.message[pos + HEAD_END.len()..])
    }

    /// Looks up a query-string parameter. Empty when absent.
    pub fn query_param(&self, name: &str) -> &str {
        self.query().map_or("", |q| param_value(q, name))
    }

    /// Looks up a form-body parameter. Empty when there is no body.
    pub fn body_param(&self, name: &str) -> &str {
        self.body().map_or("", |b| param_value(b, name))
    }

    /// Get a header value (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                Some(v)
            } else {
                None
            }
        })
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// Parse the request body as JSON.
    ///
    /// A missing body is treated as an empty document, which fails to parse.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let json = serde_json::from_str(self.body().unwrap_or(""))?;
        Ok(json)
    }
}

/// Parse an HTTP request from a byte slice.
///
/// Only the request line is strictly validated: it must be terminated by
/// `\r\n` and hold exactly a method, a path starting with `/` and an
/// `HTTP/1.x` protocol token. Header lines up to the first blank line are
/// collected into a map.
///
/// # Examples
///
/// ```
/// use microreq_rs::{parse_request, Method};
///
/// let req = parse_request(b"GET /led?state=on HTTP/1.1\r\nHost: esp\r\n\r\n").unwrap();
/// assert_eq!(req.method, Method::GET);
/// assert_eq!(req.plain_path(), "/led");
/// assert_eq!(req.query_param("state"), "on");
/// ```
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    if input.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let message = match std::str::from_utf8(input) {
        Ok(s) => s,
        Err(_) => return Err(Error::MalformedRequestLine("Invalid UTF-8".to_string())),
    };

    let (request_line, rest) = message
        .split_once(EOL)
        .ok_or_else(|| Error::MalformedRequestLine(message.to_string()))?;

    // Split the request line into method, path, and version
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let path = parts[1].to_string();
    if !path.starts_with('/') {
        return Err(Error::InvalidPath);
    }

    let version = HttpVersion::from_str(parts[2])?;

    // The blank line may directly follow the request line
    let head = if rest.starts_with(EOL) {
        ""
    } else {
        rest.find(HEAD_END).map_or(rest, |end| &rest[..end])
    };

    let mut headers = HashMap::new();
    for line in head.lines() {
        if line.is_empty() {
            break;
        }

        let (name, value) = line.split_once(':').ok_or(Error::InvalidHeaderFormat)?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    Ok(HttpRequest {
        method,
        path,
        version,
        headers,
        message: message.to_string(),
    })
}
