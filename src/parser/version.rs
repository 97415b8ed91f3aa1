//! HTTP protocol versions.

use std::fmt;
use std::str::FromStr;

use crate::parser::error::Error;

/// Accepted protocol versions. Anything of the form `HTTP/1.<digits>` parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
    /// Another `HTTP/1.x` minor version.
    Http1x(u8),
}

impl FromStr for HttpVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let minor = s
            .strip_prefix("HTTP/1.")
            .filter(|m| !m.is_empty() && m.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|m| m.parse::<u8>().ok())
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;

        Ok(match minor {
            0 => HttpVersion::Http10,
            1 => HttpVersion::Http11,
            n => HttpVersion::Http1x(n),
        })
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpVersion::Http10 => write!(f, "HTTP/1.0"),
            HttpVersion::Http11 => write!(f, "HTTP/1.1"),
            HttpVersion::Http1x(minor) => write!(f, "HTTP/1.{minor}"),
        }
    }
}
