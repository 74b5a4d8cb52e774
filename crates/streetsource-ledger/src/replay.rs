use streetsource_fabric::LedgerEvent;

use crate::error::LedgerError;
use crate::state::LedgerState;

/// Ledger state rebuilt from a journal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayResult {
    pub state: LedgerState,
    pub applied_events: u64,
    pub last_seq: u64,
}

/// Deterministic, strict journal replay.
///
/// Replay refuses to produce state from a journal with a sequence gap, an
/// integrity mismatch, or an event that breaks a ledger invariant; use
/// [`JournalValidator`](crate::JournalValidator) to list every problem.
pub struct ReplayEngine;

impl ReplayEngine {
    pub fn replay(events: &[LedgerEvent]) -> Result<ReplayResult, LedgerError> {
        Self::replay_onto(LedgerState::new(), 0, events)
    }

    /// Continue from `state`, whose last applied event was `last_seq`.
    pub fn replay_onto(
        mut state: LedgerState,
        mut last_seq: u64,
        events: &[LedgerEvent],
    ) -> Result<ReplayResult, LedgerError> {
        let mut applied_events = 0u64;

        for event in events {
            let expected = last_seq + 1;
            if event.seq != expected {
                return Err(LedgerError::Journal(format!(
                    "sequence gap: expected seq {expected}, found {}",
                    event.seq
                )));
            }
            if !event.verify_integrity() {
                return Err(LedgerError::Journal(format!(
                    "integrity hash mismatch at seq {}",
                    event.seq
                )));
            }
            state.apply(event).map_err(|e| {
                LedgerError::Journal(format!("event at seq {} is invalid: {e}", event.seq))
            })?;
            last_seq = event.seq;
            applied_events += 1;
        }

        Ok(ReplayResult {
            state,
            applied_events,
            last_seq,
        })
    }
}
