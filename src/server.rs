//! HTTP server helpers for paywalled routers
//!
//! Thin wrappers over `axum::serve` that bind the configured address, log the
//! listening socket and support graceful shutdown.

use crate::{Result, X402Error};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Default bind address of the demo API
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Configuration for HTTP server binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000")
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new server config
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
        }
    }

    /// Read `BIND_ADDRESS` from the environment, falling back to the default
    pub fn from_env() -> Self {
        std::env::var("BIND_ADDRESS")
            .ok()
            .filter(|addr| !addr.trim().is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }

    /// Bind a TCP listener on the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(&self.bind_addr).await.map_err(|e| {
            X402Error::config(format!("Failed to bind to {}: {}", self.bind_addr, e))
        })
    }
}

/// Serve `router` until `shutdown` resolves
pub async fn serve_with_shutdown<F>(
    router: Router,
    config: ServerConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = config.bind().await?;
    serve_listener(listener, router, shutdown).await
}

/// Serve `router` on an already bound listener until `shutdown` resolves
pub async fn serve_listener<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listener
        .local_addr()
        .map_err(|e| X402Error::config(format!("Failed to read local address: {}", e)))?;

    tracing::info!("🚀 HTTP server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| X402Error::config(format!("Server error: {}", e)))?;

    tracing::info!("HTTP server on {} stopped", addr);
    Ok(())
}

/// Resolve on Ctrl+C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::sync::oneshot;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_server_config_new() {
        let config = ServerConfig::new("127.0.0.1:8080");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_bind_error() {
        let err = ServerConfig::new("not-an-address").bind().await.unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let listener = ServerConfig::new("127.0.0.1:0").bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/", get(|| async { "ok" }));

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(listener, router, async {
            let _ = rx.await;
        }));

        let body = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
