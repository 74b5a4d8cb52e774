//! Supplier-trust ledger for the StreetSource marketplace.
//!
//! This crate is the heart of StreetSource. It provides:
//! - Supplier, review and statistics records with the ×100 fixed-point average
//! - `LedgerCommands` / `LedgerQueries` trait boundaries
//! - `TrustLedger`, a journaled store that serializes every mutation
//! - Owner-gated verification through `Authority`
//! - Deterministic replay of the journal on open
//! - Journal validation (sequence, integrity, invariants)

pub mod authority;
pub mod config;
pub mod error;
pub mod ledger;
pub mod records;
pub mod replay;
pub mod state;
pub mod traits;
pub mod validation;

pub use authority::{Authority, PrivilegedAction};
pub use config::{LedgerConfig, JOURNAL_FILE};
pub use error::{ErrorKind, LedgerError};
pub use ledger::TrustLedger;
pub use records::{
    scaled_average, PlatformStats, Review, Supplier, SupplierRating, SupplierSummary, MAX_SCORE,
    MIN_SCORE,
};
pub use replay::{ReplayEngine, ReplayResult};
pub use state::LedgerState;
pub use traits::{LedgerCommands, LedgerQueries};
pub use validation::{JournalValidator, ValidationReport, Violation, ViolationKind};

pub use streetsource_fabric::{EventFilter, EventKind, EventPayload, EventStream, LedgerEvent};
