//! Foundation types for the StreetSource trust ledger.
//!
//! Every other StreetSource crate depends on `streetsource-types`.
//!
//! # Key Types
//!
//! - [`CallerId`] — Unforgeable identity of whoever invokes a ledger operation
//! - [`IdentityMaterial`] — Input a `CallerId` is derived from
//! - [`TemporalAnchor`] — Hybrid Logical Clock timestamp for commit ordering

pub mod error;
pub mod identity;
pub mod temporal;

pub use error::TypeError;
pub use identity::{CallerId, IdentityMaterial};
pub use temporal::TemporalAnchor;
