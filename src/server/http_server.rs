//! Reference TCP transport.
//!
//! Connections are served one after another: a request is driven to
//! completion before the next connection is accepted.

use std::net::SocketAddr;

use log::{debug, error, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::signal;

use crate::server::error::Error;
use crate::server::service::Service;

/// A single-request-at-a-time HTTP server around a [`Service`].
pub struct HttpServer {
    /// The service answering requests.
    pub service: Service,
}

impl HttpServer {
    /// Create a server around `service`.
    pub fn new(service: Service) -> Self {
        Self { service }
    }

    /// Log the registered pages.
    fn display_server_info(&self) {
        info!("Registered pages:");
        for page in self.service.router.pages() {
            info!("  {method} {path}", method = page.method, path = page.path);
        }
        if let Some(files) = self.service.files() {
            for entry in files.entries() {
                info!("  file {name} ({size} bytes)", name = entry.name, size = entry.size);
            }
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<TcpListener, Error> {
        let listener = TcpListener::bind(&self.service.config.addr).await?;
        info!("Server listening on http://{addr}", addr = self.service.config.addr);
        Ok(listener)
    }

    /// Handle connection errors. Returns true if the loop should stop.
    async fn handle_accept_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        // For other errors, wait a bit before retrying
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        false
    }

    /// Accept and answer connections until Ctrl+C.
    pub async fn start(&self) -> Result<(), Error> {
        self.display_server_info();
        let listener = self.setup_listener().await?;

        let shutdown = signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    match result {
                        Ok(()) => info!("Received Ctrl+C, shutting down"),
                        Err(e) => error!("Error setting up Ctrl+C handler: {e}"),
                    }
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((mut socket, addr)) => {
                            if let Err(e) = Self::handle_connection(&mut socket, addr, &self.service).await {
                                error!("Error handling connection from {addr}: {e}");
                            }
                        }
                        Err(e) => {
                            if Self::handle_accept_error(e).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("Server shutdown complete");
        Ok(())
    }

    /// Read one request from `socket` and write every chunk the service produces.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        addr: SocketAddr,
        service: &Service,
    ) -> Result<(), Error> {
        // One byte past the limit so oversized requests are recognized
        let limit = service.config.max_request_size + 1;
        let mut buf = vec![0; limit];

        let mut n = 0;
        while n < limit {
            let read = socket.read(&mut buf[n..]).await?;
            if read == 0 {
                break;
            }
            n += read;
            if is_complete(&buf[..n]) {
                break;
            }
        }
        if n == 0 {
            return Ok(()); // Connection closed
        }
        debug!("Received {n} bytes from {addr}");

        let mut request = service.request(&buf[..n]);
        let mut chunks = 0usize;
        while service.run(&mut request) != 0 {
            if let Err(e) = socket.write_all(request.output()).await {
                request.abort();
                return Err(Error::IoError(e));
            }
            chunks += 1;
        }
        socket.flush().await?;

        debug!(
            "{path} answered in {chunks} chunks ({state:?})",
            path = request.path(),
            state = request.state()
        );
        request.close();
        Ok(())
    }
}

/// Returns true once `raw` holds the whole head and as many body bytes as
/// its `Content-Length` announces.
fn is_complete(raw: &[u8]) -> bool {
    let Some(head_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&raw[..head_end]);
    let body_len = head
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    raw.len() - (head_end + 4) >= body_len
}
