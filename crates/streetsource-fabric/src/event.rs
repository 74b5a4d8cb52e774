use serde::{Deserialize, Serialize};

use streetsource_types::{CallerId, TemporalAnchor};

/// Content-addressed identifier of a ledger event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub hash: [u8; 32],
}

impl EventId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

/// Classification of ledger events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SupplierRegistered,
    RatingAdded,
    SupplierVerified,
    SupplierUnverified,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SupplierRegistered => "SupplierRegistered",
            Self::RatingAdded => "RatingAdded",
            Self::SupplierVerified => "SupplierVerified",
            Self::SupplierUnverified => "SupplierUnverified",
        };
        write!(f, "{s}")
    }
}

/// What happened, carrying everything needed to re-apply it on replay.
///
/// Observers care about the identifying fields (`name`, `caller`,
/// `supplier_name`, `score`); the remaining fields exist so the journal alone
/// is enough to rebuild ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    SupplierRegistered {
        name: String,
        caller: CallerId,
        description: String,
        contact_info: String,
    },
    RatingAdded {
        caller: CallerId,
        supplier_name: String,
        score: u8,
        comment: String,
    },
    SupplierVerified {
        name: String,
    },
    SupplierUnverified {
        name: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SupplierRegistered { .. } => EventKind::SupplierRegistered,
            Self::RatingAdded { .. } => EventKind::RatingAdded,
            Self::SupplierVerified { .. } => EventKind::SupplierVerified,
            Self::SupplierUnverified { .. } => EventKind::SupplierUnverified,
        }
    }

    /// The supplier this event concerns.
    pub fn supplier_name(&self) -> &str {
        match self {
            Self::SupplierRegistered { name, .. }
            | Self::SupplierVerified { name }
            | Self::SupplierUnverified { name } => name,
            Self::RatingAdded { supplier_name, .. } => supplier_name,
        }
    }
}

/// A committed ledger event.
///
/// `seq` is the 1-based journal position; it is gap-free and defines commit
/// order. The integrity hash covers `seq`, `timestamp` and `payload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Content address derived from the integrity hash.
    pub id: EventId,
    /// Journal position, starting at 1 with no gaps.
    pub seq: u64,
    /// Commit time from the fabric clock.
    pub timestamp: TemporalAnchor,
    /// The ledger mutation this event records.
    pub payload: EventPayload,
    /// BLAKE3 over `seq`, `timestamp` and the encoded payload.
    pub integrity_hash: [u8; 32],
}

impl LedgerEvent {
    /// Build a new event, computing its integrity hash and ID.
    pub fn new(seq: u64, timestamp: TemporalAnchor, payload: EventPayload) -> Self {
        let integrity_hash = Self::compute_integrity(seq, &timestamp, &payload);
        Self {
            id: EventId::from_hash(integrity_hash),
            seq,
            timestamp,
            payload,
            integrity_hash,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Verify the integrity hash (and the ID derived from it) match the content.
    pub fn verify_integrity(&self) -> bool {
        let expected = Self::compute_integrity(self.seq, &self.timestamp, &self.payload);
        self.integrity_hash == expected && self.id.hash == expected
    }

    fn compute_integrity(seq: u64, timestamp: &TemporalAnchor, payload: &EventPayload) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"streetsource-event-v1:");
        hasher.update(&seq.to_le_bytes());
        hasher.update(&timestamp.physical_ms.to_le_bytes());
        hasher.update(&timestamp.logical.to_le_bytes());
        hasher.update(&timestamp.node_id.to_le_bytes());

        if let Ok(payload_bytes) = bincode::serialize(payload) {
            hasher.update(&payload_bytes);
        }

        *hasher.finalize().as_bytes()
    }
}
