//! Event fabric for the StreetSource trust ledger.
//!
//! Every committed ledger mutation becomes a [`LedgerEvent`]: stamped by a
//! [`Clock`], given the next journal sequence number, appended to the
//! [`WriteAheadLog`] and then fanned out to subscribers. The journal is the
//! ledger's durable store; replaying it reproduces ledger state.

pub mod error;
pub mod event;
pub mod fabric;
pub mod hlc;
pub mod wal;

pub use error::FabricError;
pub use event::{EventId, EventKind, EventPayload, LedgerEvent};
pub use fabric::{EventFabric, EventFilter, EventStream, FabricConfig};
pub use hlc::{Clock, HybridLogicalClock, ManualClock};
pub use wal::{
    DamagedFrame, JournalScan, ScanEnd, SyncMode, WalConfig, WalEntry, WriteAheadLog,
    MAX_ENTRY_BYTES,
};
