use std::io;

/// Errors produced by the event fabric subsystem.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// I/O error during journal file operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The journal returned events out of sequence.
    #[error("journal sequence gap: expected seq {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    /// The journal holds a frame that cannot be a torn tail. Opening never
    /// truncates past it.
    #[error("journal corrupted at byte {offset}: {reason}")]
    Corrupted { offset: u64, reason: String },

    /// An append failed and could not be rolled back.
    #[error("journal is unusable after a failed append; reopen to recover")]
    JournalFailed,

    /// An internal lock was poisoned by a panicking writer.
    #[error("fabric lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the fabric crate.
pub type Result<T> = std::result::Result<T, FabricError>;
