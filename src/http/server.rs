//! HTTP server implementation.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::{router, AppState};
use crate::error::{Result, TierGateError};

/// HTTP server for the gated RPC surface and diagnostics.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared handler state
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    /// Bind the listener.
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.addr).await?)
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve_on(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        info!(
            addr = %listener.local_addr()?,
            environment = ?self.state.environment,
            "Starting HTTP server"
        );

        let app = router(self.state).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                TierGateError::Io(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, TtlCache};
    use crate::config::Environment;
    use crate::ratelimit::{RateLimiterRegistry, TierLimits};
    use std::sync::Arc;

    fn state() -> AppState {
        let cache = Arc::new(TtlCache::new(CacheConfig::default()));
        let registry = Arc::new(RateLimiterRegistry::new(cache, TierLimits::default()));
        AppState::new(registry, Environment::Test, "http://localhost:5173")
    }

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let _server = HttpServer::new(addr, state());
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = HttpServer::new(addr, state());
        let listener = server.bind().await.unwrap();

        let result = server.serve_on(listener, async {}).await;
        assert!(result.is_ok());
    }
}
