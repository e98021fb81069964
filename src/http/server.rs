//! HTTP server implementation.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};

use super::service::RateLimitService;
use crate::error::Result;

/// HTTP server for the rate limit decision service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The decision service
    service: RateLimitService,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, service: RateLimitService) -> Self {
        Self { addr, service }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            e
        })?;

        info!(
            addr = %self.addr,
            "Starting HTTP server for rate limit decisions"
        );

        axum::serve(listener, self.service.router())
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                e.into()
            })
    }
}
