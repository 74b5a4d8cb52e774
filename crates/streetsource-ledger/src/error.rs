use streetsource_fabric::FabricError;
use streetsource_types::CallerId;

use crate::authority::PrivilegedAction;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Malformed input: empty name, out-of-range score, empty comment.
    #[error("validation error: {0}")]
    Validation(String),

    /// Duplicate supplier name or duplicate rating.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("supplier not found: {0}")]
    NotFound(String),

    #[error("caller {caller} is not authorized to {action}")]
    Unauthorized {
        caller: CallerId,
        action: PrivilegedAction,
    },

    #[error("journal error: {0}")]
    Journal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

/// Coarse classification used by transports to pick a status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Internal => "internal",
        }
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Journal(_) | Self::Config(_) | Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}

impl From<FabricError> for LedgerError {
    fn from(e: FabricError) -> Self {
        Self::Journal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(LedgerError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(LedgerError::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(LedgerError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(LedgerError::LockPoisoned.kind(), ErrorKind::Internal);
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
    }

    #[test]
    fn unauthorized_message_names_action() {
        let err = LedgerError::Unauthorized {
            caller: CallerId::from_raw([0x11; 32]),
            action: PrivilegedAction::VerifySupplier,
        };
        assert_eq!(err.to_string(), "caller id:11111111 is not authorized to verify suppliers");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn fabric_errors_become_journal_errors() {
        let err: LedgerError = FabricError::LockPoisoned.into();
        assert_eq!(err, LedgerError::Journal("fabric lock poisoned".into()));
    }
}
