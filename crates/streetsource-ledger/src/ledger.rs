use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use streetsource_fabric::{
    Clock, EventFabric, EventFilter, EventPayload, EventStream, LedgerEvent, ScanEnd,
    WriteAheadLog,
};
use streetsource_types::CallerId;
use tracing::{debug, info};

use crate::authority::{Authority, PrivilegedAction};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::records::{PlatformStats, Review, Supplier, SupplierRating, SupplierSummary};
use crate::replay::ReplayEngine;
use crate::state::LedgerState;
use crate::traits::{LedgerCommands, LedgerQueries};
use crate::validation::{JournalValidator, ValidationReport};

/// Journaled supplier-trust ledger.
///
/// Commands hold the state write lock across validation, journal append,
/// state application and event publication. A command that fails at any
/// step leaves both the journal and the state as they were.
pub struct TrustLedger {
    state: RwLock<LedgerState>,
    fabric: EventFabric,
    authority: Authority,
}

impl TrustLedger {
    /// Open (or create) the ledger in `config.data_dir`, replaying the
    /// journal.
    pub fn open(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let fabric = EventFabric::open(&config.journal_path(), config.fabric_config())?;
        Self::from_fabric(config, fabric)
    }

    /// Open with an injected clock.
    pub fn open_with_clock(
        config: &LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let fabric =
            EventFabric::open_with_clock(&config.journal_path(), config.fabric_config(), clock)?;
        Self::from_fabric(config, fabric)
    }

    fn from_fabric(config: &LedgerConfig, fabric: EventFabric) -> Result<Self, LedgerError> {
        let owner = config
            .owner
            .ok_or_else(|| LedgerError::Config("ledger owner is not configured".into()))?;

        let events = fabric.recover()?;
        let replayed = ReplayEngine::replay(&events)?;
        let stats = replayed.state.stats();
        info!(
            data_dir = %config.data_dir.display(),
            owner = %owner,
            events = replayed.applied_events,
            suppliers = stats.total_suppliers,
            ratings = stats.total_ratings,
            "ledger opened"
        );

        Ok(Self {
            state: RwLock::new(replayed.state),
            fabric,
            authority: Authority::new(owner),
        })
    }

    /// Check the journal under `config.data_dir` without replaying it.
    ///
    /// Unlike [`TrustLedger::open`], this reports every problem instead of
    /// refusing to start, so it works on journals the ledger cannot open.
    /// The journal file is only read, never repaired.
    pub fn inspect_journal(config: &LedgerConfig) -> Result<ValidationReport, LedgerError> {
        let scan = WriteAheadLog::read_entries(&config.journal_path())?;
        let events: Vec<LedgerEvent> = scan.entries.iter().map(|e| e.event.clone()).collect();
        let next_seq = |preceding: usize| {
            preceding
                .checked_sub(1)
                .and_then(|i| events.get(i))
                .map_or(1, |e| e.seq + 1)
        };

        let mut report = JournalValidator::validate(&events);
        for frame in &scan.damaged {
            report.record_damage(
                next_seq(frame.preceding_entries),
                format!("frame at byte {} skipped: {}", frame.offset, frame.reason),
            );
        }
        match &scan.end {
            ScanEnd::Clean => {}
            ScanEnd::TornTail { bytes } => {
                debug!(bytes, "journal ends in an unfinished append");
            }
            ScanEnd::Corrupted { offset, reason } => report.record_damage(
                next_seq(events.len()),
                format!("unreadable from byte {offset}: {reason}"),
            ),
        }
        Ok(report)
    }

    /// Validate the journal this ledger is running on.
    pub fn validate_journal(&self) -> Result<ValidationReport, LedgerError> {
        let _state = self.read()?;
        let events = self.fabric.recover()?;
        Ok(JournalValidator::validate(&events))
    }

    pub fn owner(&self) -> &CallerId {
        self.authority.owner()
    }

    /// Subscribe to events committed after this call.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.fabric.subscribe(filter)
    }

    /// Committed events with `seq > after`, for catch-up after lag.
    pub fn events_since(&self, after: u64) -> Result<Vec<LedgerEvent>, LedgerError> {
        Ok(self.fabric.events_since(after)?)
    }

    pub fn last_seq(&self) -> Result<u64, LedgerError> {
        Ok(self.fabric.last_seq()?)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.state.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.state.write().map_err(|_| LedgerError::LockPoisoned)
    }

    /// Journal the payload, then apply it. Caller holds the write lock and
    /// has already validated the payload against `state`.
    fn commit(
        &self,
        state: &mut LedgerState,
        payload: EventPayload,
    ) -> Result<LedgerEvent, LedgerError> {
        let event = self.fabric.emit(payload)?;
        state.apply(&event)?;
        debug!(seq = event.seq, kind = %event.kind(), "ledger event applied");
        Ok(event)
    }

    fn set_verified(
        &self,
        supplier_name: &str,
        caller: &CallerId,
        verified: bool,
    ) -> Result<bool, LedgerError> {
        let action = if verified {
            PrivilegedAction::VerifySupplier
        } else {
            PrivilegedAction::UnverifySupplier
        };
        self.authority.authorize(caller, action)?;

        let mut state = self.write()?;
        if state.supplier(supplier_name)?.is_verified == verified {
            debug!(supplier = supplier_name, verified, "verification unchanged");
            return Ok(false);
        }

        let name = supplier_name.to_string();
        let payload = if verified {
            EventPayload::SupplierVerified { name }
        } else {
            EventPayload::SupplierUnverified { name }
        };
        self.commit(&mut state, payload)?;
        info!(supplier = supplier_name, verified, "supplier verification changed");
        Ok(true)
    }
}

impl LedgerCommands for TrustLedger {
    fn register_supplier(
        &self,
        name: &str,
        description: &str,
        contact_info: &str,
        caller: &CallerId,
    ) -> Result<Supplier, LedgerError> {
        let mut state = self.write()?;
        state.check_registration(name)?;

        self.commit(
            &mut state,
            EventPayload::SupplierRegistered {
                name: name.to_string(),
                caller: *caller,
                description: description.to_string(),
                contact_info: contact_info.to_string(),
            },
        )?;
        info!(supplier = name, %caller, "supplier registered");
        Ok(state.supplier(name)?.clone())
    }

    fn add_rating(
        &self,
        supplier_name: &str,
        score: u8,
        comment: &str,
        caller: &CallerId,
    ) -> Result<Review, LedgerError> {
        let mut state = self.write()?;
        state.check_rating(caller, supplier_name, score, comment)?;

        self.commit(
            &mut state,
            EventPayload::RatingAdded {
                caller: *caller,
                supplier_name: supplier_name.to_string(),
                score,
                comment: comment.to_string(),
            },
        )?;
        let review = state
            .reviews(supplier_name)
            .last()
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(supplier_name.to_string()))?;
        Ok(review)
    }

    fn verify_supplier(&self, supplier_name: &str, caller: &CallerId) -> Result<bool, LedgerError> {
        self.set_verified(supplier_name, caller, true)
    }

    fn unverify_supplier(
        &self,
        supplier_name: &str,
        caller: &CallerId,
    ) -> Result<bool, LedgerError> {
        self.set_verified(supplier_name, caller, false)
    }
}

impl LedgerQueries for TrustLedger {
    fn all_suppliers(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.read()?.supplier_names().to_vec())
    }

    fn supplier_details(&self, name: &str) -> Result<Supplier, LedgerError> {
        Ok(self.read()?.supplier(name)?.clone())
    }

    fn supplier_rating(&self, name: &str) -> Result<SupplierRating, LedgerError> {
        Ok(self.read()?.supplier(name)?.rating())
    }

    fn supplier_reviews(&self, name: &str) -> Result<Vec<Review>, LedgerError> {
        Ok(self.read()?.reviews(name).to_vec())
    }

    fn platform_stats(&self) -> Result<PlatformStats, LedgerError> {
        Ok(self.read()?.stats())
    }

    fn user_ratings(&self, caller: &CallerId) -> Result<Vec<String>, LedgerError> {
        Ok(self.read()?.user_ratings(caller).to_vec())
    }

    fn has_rated(&self, caller: &CallerId, supplier_name: &str) -> Result<bool, LedgerError> {
        Ok(self.read()?.has_rated(caller, supplier_name))
    }

    fn supplier_summaries(&self) -> Result<Vec<SupplierSummary>, LedgerError> {
        Ok(self.read()?.summaries())
    }
}
