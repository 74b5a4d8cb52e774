//! HTTP server for StreetSource.
//!
//! Exposes the supplier-trust ledger over a JSON REST API. Commands carry
//! the caller identity in a configurable header; verification endpoints are
//! owner-gated by the ledger itself.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{parse_caller, AuthProvider, Caller, Credentials, HeaderAuth};
pub use config::{HttpConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::StreetSourceServer;
pub use state::AppState;
