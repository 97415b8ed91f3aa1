//! Configuration, pages and storage shared by every request.

use log::info;

use crate::parser::Method;
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::request::Request;
use crate::server::router::Router;
use crate::server::storage::{FsImage, Storage};

/// Everything a request consults while it is driven.
///
/// Build it at startup, register pages, then share it by reference.
pub struct Service {
    /// The limits requests are created with.
    pub config: ServerConfig,
    /// The page table.
    pub router: Router,
    storage: Option<Box<dyn Storage>>,
    files: Option<FsImage>,
}

impl Service {
    /// Create a service with an empty router sized by `config.max_routes`.
    pub fn new(config: ServerConfig) -> Self {
        let router = Router::with_max_routes(config.max_routes);
        Self {
            config,
            router,
            storage: None,
            files: None,
        }
    }

    /// Register a page. See [`Router::serve`].
    pub fn serve<F>(&mut self, path: impl Into<String>, method: Method, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Request) -> String + Send + Sync + 'static,
    {
        self.router.serve(path, method, handler)
    }

    /// Attach storage for handlers that stream raw ranges.
    pub fn with_storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Attach storage holding a file image at `base` and read its directory.
    ///
    /// Files of the image become reachable through [`Request::send_file`]
    /// and by their name for paths no page matches.
    pub fn mount_image(&mut self, storage: impl Storage + 'static, base: u64) -> Result<(), Error> {
        let image = FsImage::load(&storage, base)?;
        info!("Mounted image with {} files", image.entries().len());
        self.storage = Some(Box::new(storage));
        self.files = Some(image);
        Ok(())
    }

    /// The attached storage, if any.
    pub fn storage(&self) -> Option<&dyn Storage> {
        self.storage.as_deref()
    }

    /// The directory of the mounted file image, if any.
    pub fn files(&self) -> Option<&FsImage> {
        self.files.as_ref()
    }

    /// Build a request from raw bytes with this service's limits.
    pub fn request(&self, raw: &[u8]) -> Request {
        Request::new(raw, &self.config)
    }

    /// Drive `req` one step. See [`Request::run`].
    pub fn run(&self, req: &mut Request) -> i32 {
        req.run(self)
    }
}
