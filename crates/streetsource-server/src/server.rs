use std::sync::Arc;

use streetsource_ledger::TrustLedger;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// StreetSource HTTP server over one ledger.
pub struct StreetSourceServer {
    config: ServerConfig,
    state: AppState,
}

impl StreetSourceServer {
    /// Open the ledger named by `config.ledger`, replaying its journal.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let ledger = Arc::new(TrustLedger::open(&config.ledger)?);
        Ok(Self::with_ledger(config, ledger))
    }

    pub fn with_ledger(config: ServerConfig, ledger: Arc<TrustLedger>) -> Self {
        let state = AppState::new(ledger, &config.server.caller_header);
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        tracing::info!(
            addr = %self.config.server.bind_addr,
            owner = %self.state.ledger().owner(),
            "StreetSource server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streetsource_types::CallerId;

    #[test]
    fn open_requires_owner() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.ledger.data_dir = dir.path().to_path_buf();
        assert!(matches!(
            StreetSourceServer::open(config),
            Err(ServerError::Ledger(_))
        ));
    }

    #[test]
    fn server_construction() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.ledger.data_dir = dir.path().to_path_buf();
        config.ledger.owner = Some(CallerId::account("owner"));
        config.server.caller_header = "X-Caller-Id".into();

        let server = StreetSourceServer::open(config).unwrap();
        assert_eq!(server.config().server.bind_addr.port(), 8088);
        assert_eq!(server.state().caller_header(), "x-caller-id");
        let _router = server.router();
    }
}
