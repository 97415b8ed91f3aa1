//! The request-handling core.
//!
//! Pages are registered on a [`Service`]; each incoming request becomes a
//! [`Request`] that is driven chunk by chunk until it reports completion.

mod response;
mod config;
mod error;
mod handler;
mod mime;
mod request;
mod router;
mod service;
mod storage;
mod template;
mod http_server;
mod tests;

// Re-export public items
pub use response::{error_page, Chunk, Response, StatusCode, HTTP_VERSION, PAGE_404};
pub use config::ServerConfig;
pub use error::Error;
pub use handler::{HandlerFn, Page};
pub use mime::{mime_for, DEFAULT_MIME};
pub use request::{Request, State};
pub use router::{Resolution, Router, NOT_FOUND_PATH};
pub use service::Service;
pub use storage::{FileStorage, FsEntry, FsImage, LargePayload, Storage, NAME_LEN};
pub use template::{render, Outcome, Template};
pub use http_server::HttpServer;
