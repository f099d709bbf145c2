use marquee_core::Cms;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Marquee HTTP server.
pub struct MarqueeServer {
    config: AppConfig,
    cms: Cms,
}

impl MarqueeServer {
    /// Open the configured stores.
    pub fn new(config: AppConfig) -> ServerResult<Self> {
        config.validate()?;
        let cms = Cms::from_config(&config.cms())?;
        Ok(Self { config, cms })
    }

    /// Serve an already-assembled backend.
    pub fn with_cms(config: AppConfig, cms: Cms) -> Self {
        Self { config, cms }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cms(&self) -> &Cms {
        &self.cms
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        build_router(self.cms.clone(), &self.config)
    }

    /// Start serving requests until the process is interrupted.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.server.bind_addr).await?;
        let (records, assets) = self.cms.backends();
        tracing::info!(
            addr = %self.config.server.bind_addr,
            records,
            assets,
            "marquee server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
