use streetsource_fabric::LedgerEvent;

use crate::state::LedgerState;

/// Result of journal validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub event_count: u64,
    /// Every frame in the journal file decoded to an event.
    pub frames_intact: bool,
    pub sequence_dense: bool,
    pub integrity_valid: bool,
    pub invariants_hold: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Record a journal frame that could not be read as an event.
    pub fn record_damage(&mut self, seq: u64, description: String) {
        self.frames_intact = false;
        self.violations.push(Violation {
            seq,
            kind: ViolationKind::DamagedFrame,
            description,
        });
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Sequence number of the offending event, or the one expected where
    /// a frame was lost.
    pub seq: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    SequenceGap,
    IntegrityMismatch,
    InvariantBroken,
    DamagedFrame,
}

/// Non-strict journal checker: walks every event and reports all problems
/// instead of stopping at the first.
pub struct JournalValidator;

impl JournalValidator {
    pub fn validate(events: &[LedgerEvent]) -> ValidationReport {
        let mut violations = Vec::new();
        let mut sequence_dense = true;
        let mut integrity_valid = true;
        let mut invariants_hold = true;
        let mut state = LedgerState::new();
        let mut expected_seq = 1u64;

        for event in events {
            if event.seq != expected_seq {
                sequence_dense = false;
                violations.push(Violation {
                    seq: event.seq,
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, got {}", event.seq),
                });
            }
            expected_seq = event.seq + 1;

            if !event.verify_integrity() {
                integrity_valid = false;
                violations.push(Violation {
                    seq: event.seq,
                    kind: ViolationKind::IntegrityMismatch,
                    description: "integrity hash does not match content".into(),
                });
            }

            // A failed apply leaves the state unchanged, so later events are
            // still checked against a consistent ledger.
            if let Err(e) = state.apply(event) {
                invariants_hold = false;
                violations.push(Violation {
                    seq: event.seq,
                    kind: ViolationKind::InvariantBroken,
                    description: format!("{} event rejected: {e}", event.kind()),
                });
            }
        }

        ValidationReport {
            event_count: events.len() as u64,
            frames_intact: true,
            sequence_dense,
            integrity_valid,
            invariants_hold,
            violations,
        }
    }
}
