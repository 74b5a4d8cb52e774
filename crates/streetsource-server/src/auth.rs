use std::str::FromStr;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use streetsource_types::CallerId;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Prefix selecting account-name identities in header values and paths.
pub const ACCOUNT_PREFIX: &str = "account:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    /// Raw value of the caller header.
    Caller(String),
    Anonymous,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<CallerId>;
}

/// Accepts the presented identity as-is. Suitable behind a gateway that
/// has already authenticated the caller.
pub struct HeaderAuth;

#[async_trait]
impl AuthProvider for HeaderAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<CallerId> {
        match credentials {
            Credentials::Caller(value) => parse_caller(value)
                .map_err(|e| ServerError::Unauthenticated(format!("invalid caller identity: {e}"))),
            Credentials::Anonymous => Err(ServerError::Unauthenticated(
                "missing caller identity".into(),
            )),
        }
    }
}

/// Parse `account:<name>`, `id:<hex>` or bare 64-char hex into a caller id.
pub fn parse_caller(value: &str) -> ServerResult<CallerId> {
    let value = value.trim();
    if let Some(name) = value.strip_prefix(ACCOUNT_PREFIX) {
        if name.is_empty() {
            return Err(ServerError::BadRequest("empty account name".into()));
        }
        return Ok(CallerId::account(name));
    }
    CallerId::from_str(value).map_err(|e| ServerError::BadRequest(e.to_string()))
}

/// Authenticated caller of a command endpoint.
#[derive(Clone, Copy, Debug)]
pub struct Caller(pub CallerId);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credentials = match parts.headers.get(state.caller_header()) {
            Some(value) => Credentials::Caller(
                value
                    .to_str()
                    .map_err(|_| ServerError::Unauthenticated("caller header is not text".into()))?
                    .to_string(),
            ),
            None => Credentials::Anonymous,
        };
        let caller = state.auth().authenticate(&credentials).await?;
        Ok(Caller(caller))
    }
}
