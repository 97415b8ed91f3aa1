//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};

use serde::Deserialize;

use crate::server::error::Error;

/// Limits and transport settings.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The address the reference transport binds to.
    pub addr: SocketAddr,
    /// Raw requests longer than this are answered with 413.
    pub max_request_size: usize,
    /// Size of the per-request working buffer; one storage read fills at most this much.
    pub buffer_size: usize,
    /// Upper bound on registered pages. `None` lets the router grow.
    pub max_routes: Option<usize>,
    /// Template bindings a single request may register.
    pub max_templates: usize,
}

impl ServerConfig {
    /// Load a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_request_size: 1024,
            buffer_size: 1024,
            max_routes: None,
            max_templates: 16,
        }
    }
}
