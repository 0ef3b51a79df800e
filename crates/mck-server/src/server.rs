use std::sync::Arc;

use tokio::net::TcpListener;

use mck_sdk::{Deriver, Mockchain, NoopDeriver};

use crate::config::NodeConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Mockchain HTTP node.
pub struct MockchainServer {
    config: NodeConfig,
    chain: Arc<Mockchain>,
}

impl MockchainServer {
    /// Build a node with no derivation capability. Needs a Tokio runtime.
    pub fn new(config: NodeConfig) -> Self {
        Self::with_deriver(config, Arc::new(NoopDeriver))
    }

    pub fn with_deriver(config: NodeConfig, deriver: Arc<dyn Deriver>) -> Self {
        let chain = Arc::new(Mockchain::new(config.mockchain(), deriver));
        Self { config, chain }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn chain(&self) -> &Arc<Mockchain> {
        &self.chain
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(Arc::clone(&self.chain), self.config.clone()))
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("mockchain listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutting down");
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_construction() {
        let server = MockchainServer::new(NodeConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:8082".parse().unwrap());
        assert_eq!(server.chain().config().default_fund_amount, 100_000_000);
    }

    #[tokio::test]
    async fn config_reaches_the_chain() {
        let server = MockchainServer::new(NodeConfig {
            default_fund_amount: 5,
            ..NodeConfig::default()
        });
        let applied = server.chain().fund(&"A1".into(), None).unwrap();
        assert_eq!(applied.created[0].amount, 5);
    }
}
