//! HTTP server lifecycle
//!
//! Binds the control listener, runs the registry's event task next to it and
//! stops every transcoder once the server has drained.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;
use crate::registry::{RegistryConfig, StreamRegistry};
use crate::server::config::ServerConfig;
use crate::server::routes;

/// HLS restream control server
pub struct RestreamServer {
    config: ServerConfig,
    registry: Arc<StreamRegistry>,
}

impl RestreamServer {
    /// Create a new server with the given server and registry configuration
    pub fn new(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        Self::with_registry(config, Arc::new(StreamRegistry::with_config(registry_config)))
    }

    /// Create a server around an existing registry
    pub fn with_registry(config: ServerConfig, registry: Arc<StreamRegistry>) -> Self {
        Self { config, registry }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// In-flight requests are drained, then every stream is stopped.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            mode = ?self.registry.config().mode,
            output = %self.registry.output_dir().path().display(),
            "HLS restream server listening"
        );

        let events = self.registry.spawn_event_task();
        let app = routes::router(Arc::clone(&self.registry), &self.config);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        self.registry.shutdown().await;
        events.abort();

        tracing::info!("HLS restream server shut down");
        result.map_err(Into::into)
    }
}
