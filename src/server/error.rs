//! Error types for the request-handling core.

use thiserror::Error;

use crate::parser::Error as ParserError;

/// Errors that can occur while registering pages, preparing responses or
/// serving connections.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A fixed-capacity router is full.
    #[error("Router is full ({0} pages)")]
    RouterFull(usize),

    /// The request already holds the maximum number of template bindings.
    #[error("Template limit reached ({0} bindings)")]
    TemplateLimit(usize),

    /// Template bindings can only be added while the handler runs for the first time.
    #[error("Template bindings are closed once the header is produced")]
    TemplateClosed,

    /// The storage does not contain a well-formed file image.
    #[error("Invalid file image: {0}")]
    InvalidImage(String),

    /// File names in an image are limited to 15 bytes.
    #[error("File name too long for image: {0}")]
    FileNameTooLong(String),

    /// A large payload was requested but the service has no storage attached.
    #[error("No storage attached")]
    StorageUnavailable,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
