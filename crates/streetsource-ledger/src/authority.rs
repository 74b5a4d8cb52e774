use std::fmt;

use serde::{Deserialize, Serialize};
use streetsource_types::CallerId;
use tracing::warn;

use crate::error::LedgerError;

/// Operations reserved for the ledger owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivilegedAction {
    VerifySupplier,
    UnverifySupplier,
}

impl fmt::Display for PrivilegedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerifySupplier => write!(f, "verify suppliers"),
            Self::UnverifySupplier => write!(f, "unverify suppliers"),
        }
    }
}

/// Capability check against the single configured owner identity.
#[derive(Clone, Debug)]
pub struct Authority {
    owner: CallerId,
}

impl Authority {
    pub fn new(owner: CallerId) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> &CallerId {
        &self.owner
    }

    pub fn is_owner(&self, caller: &CallerId) -> bool {
        *caller == self.owner
    }

    /// Succeeds only when `caller` is the owner.
    pub fn authorize(
        &self,
        caller: &CallerId,
        action: PrivilegedAction,
    ) -> Result<(), LedgerError> {
        if self.is_owner(caller) {
            return Ok(());
        }
        warn!(%caller, %action, "privileged call rejected");
        Err(LedgerError::Unauthorized {
            caller: *caller,
            action,
        })
    }
}
