//! Page handlers and bindings.

use std::fmt;
use std::sync::Arc;

use crate::parser::Method;
use crate::server::request::Request;

/// A page handler. It returns the body text and may set response fields on
/// the request as a side effect.
///
/// Handlers run once while the header is prepared and again to produce the
/// body, so they should be idempotent.
pub type HandlerFn = Arc<dyn Fn(&mut Request) -> String + Send + Sync>;

/// A registered (path, method, handler) binding.
#[derive(Clone)]
pub struct Page {
    /// The exact path to match, without query string.
    pub path: String,
    /// The method to match; `ALL` matches every method.
    pub method: Method,
    /// The handler function.
    pub handler: HandlerFn,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("path", &self.path)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
