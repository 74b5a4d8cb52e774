use std::sync::Arc;

use streetsource_ledger::TrustLedger;

use crate::auth::{AuthProvider, HeaderAuth};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<TrustLedger>,
    auth: Arc<dyn AuthProvider>,
    caller_header: Arc<str>,
}

impl AppState {
    pub fn new(ledger: Arc<TrustLedger>, caller_header: &str) -> Self {
        Self {
            ledger,
            auth: Arc::new(HeaderAuth),
            caller_header: Arc::from(caller_header.to_ascii_lowercase()),
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    pub fn ledger(&self) -> &Arc<TrustLedger> {
        &self.ledger
    }

    pub fn auth(&self) -> &dyn AuthProvider {
        self.auth.as_ref()
    }

    pub fn caller_header(&self) -> &str {
        &self.caller_header
    }
}
