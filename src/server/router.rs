//! Ordered page table with first-match-wins resolution.

use std::sync::Arc;

use log::{debug, warn};

use crate::parser::Method;
use crate::server::error::Error;
use crate::server::handler::Page;
use crate::server::request::Request;

/// Reserved path of the custom not-found page.
pub const NOT_FOUND_PATH: &str = "404";

/// Result of resolving a request against the router.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolution<'a> {
    /// The first page whose path and method match.
    pub page: Option<&'a Page>,
    /// The first page registered under [`NOT_FOUND_PATH`], if any.
    pub not_found: Option<&'a Page>,
}

/// The page table.
///
/// Populated before serving and only read afterwards, so it is shared by
/// plain reference.
#[derive(Debug, Default)]
pub struct Router {
    pages: Vec<Page>,
    max_routes: Option<usize>,
}

impl Router {
    /// Create a router that grows as pages are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router holding at most `max_routes` pages when set.
    pub fn with_max_routes(max_routes: Option<usize>) -> Self {
        Self {
            pages: Vec::with_capacity(max_routes.unwrap_or(0)),
            max_routes,
        }
    }

    /// Register a page. Registration order decides which page wins when
    /// several match.
    ///
    /// Fails with [`Error::RouterFull`] once a capacity limit is reached; the
    /// page is then not registered and the router is left unchanged.
    pub fn serve<F>(&mut self, path: impl Into<String>, method: Method, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Request) -> String + Send + Sync + 'static,
    {
        let path = path.into();
        if let Some(max) = self.max_routes {
            if self.pages.len() >= max {
                warn!("Router full, dropping {method} {path}");
                return Err(Error::RouterFull(max));
            }
        }

        debug!("Registered {method} {path}");
        self.pages.push(Page {
            path,
            method,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Find the page for `path` (query string ignored) and `method`, and the
    /// custom not-found page.
    pub fn resolve(&self, path: &str, method: Method) -> Resolution<'_> {
        let plain = path.split_once('?').map_or(path, |(p, _)| p);

        Resolution {
            page: self
                .pages
                .iter()
                .find(|page| page.path == plain && page.method.matches(method)),
            not_found: self.pages.iter().find(|page| page.path == NOT_FOUND_PATH),
        }
    }

    /// The registered pages in registration order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Number of registered pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns true if no page is registered.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
