//! HTTP parser module.
//!
//! Turns a raw request buffer into an [`HttpRequest`] and provides the lazy
//! parameter lookup used by handlers.

mod request;
mod method;
mod version;
mod error;
mod params;

// Re-export public items
pub use request::{HttpRequest, EOL};
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;
pub use params::param_value;

// Re-export the parse_request function
pub use request::parse_request;
