use std::collections::{HashMap, HashSet};

use streetsource_fabric::{EventPayload, LedgerEvent};
use streetsource_types::CallerId;

use crate::error::LedgerError;
use crate::records::{PlatformStats, Review, Supplier, SupplierSummary, MAX_SCORE, MIN_SCORE};

/// In-memory projection of the journal: suppliers, reviews and indices.
///
/// Every mutation goes through [`LedgerState::apply`], which re-checks the
/// invariants the command path already checked. The live path and journal
/// replay therefore share one definition of what a valid event is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    suppliers: HashMap<String, Supplier>,
    registration_order: Vec<String>,
    reviews: HashMap<String, Vec<Review>>,
    rated: HashSet<(CallerId, String)>,
    user_ratings: HashMap<CallerId, Vec<String>>,
    stats: PlatformStats,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Checks ----

    pub fn check_registration(&self, name: &str) -> Result<(), LedgerError> {
        if name.is_empty() {
            return Err(LedgerError::Validation("supplier name cannot be empty".into()));
        }
        if self.suppliers.contains_key(name) {
            return Err(LedgerError::Conflict(format!("supplier '{name}' already exists")));
        }
        Ok(())
    }

    /// Checks in order: supplier exists, score in range, comment present,
    /// caller has not rated this supplier.
    pub fn check_rating(
        &self,
        caller: &CallerId,
        supplier_name: &str,
        score: u8,
        comment: &str,
    ) -> Result<(), LedgerError> {
        self.supplier(supplier_name)?;
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(LedgerError::Validation(format!(
                "score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
            )));
        }
        if comment.is_empty() {
            return Err(LedgerError::Validation("comment cannot be empty".into()));
        }
        if self.has_rated(caller, supplier_name) {
            return Err(LedgerError::Conflict(format!(
                "{caller} has already rated '{supplier_name}'"
            )));
        }
        Ok(())
    }

    // ---- Mutation ----

    /// Apply a committed event. Verification events that would not change
    /// the flag are accepted and leave the tally untouched.
    pub fn apply(&mut self, event: &LedgerEvent) -> Result<(), LedgerError> {
        match &event.payload {
            EventPayload::SupplierRegistered {
                name,
                description,
                contact_info,
                ..
            } => {
                self.check_registration(name)?;
                self.suppliers.insert(
                    name.clone(),
                    Supplier::new(
                        name.clone(),
                        description.clone(),
                        contact_info.clone(),
                        event.timestamp,
                    ),
                );
                self.registration_order.push(name.clone());
                self.stats.total_suppliers += 1;
            }
            EventPayload::RatingAdded {
                caller,
                supplier_name,
                score,
                comment,
            } => {
                self.check_rating(caller, supplier_name, *score, comment)?;
                let supplier = self.supplier_mut(supplier_name)?;
                supplier.total_ratings += 1;
                supplier.rating_sum += u64::from(*score);
                let verified = supplier.is_verified;

                self.reviews
                    .entry(supplier_name.clone())
                    .or_default()
                    .push(Review {
                        reviewer: *caller,
                        supplier_name: supplier_name.clone(),
                        score: *score,
                        comment: comment.clone(),
                        timestamp: event.timestamp,
                        verified,
                    });
                self.user_ratings
                    .entry(*caller)
                    .or_default()
                    .push(supplier_name.clone());
                self.rated.insert((*caller, supplier_name.clone()));
                self.stats.total_ratings += 1;
            }
            EventPayload::SupplierVerified { name } => {
                self.set_verified(name, true)?;
            }
            EventPayload::SupplierUnverified { name } => {
                self.set_verified(name, false)?;
            }
        }
        Ok(())
    }

    fn set_verified(&mut self, name: &str, verified: bool) -> Result<(), LedgerError> {
        let supplier = self.supplier_mut(name)?;
        if supplier.is_verified == verified {
            return Ok(());
        }
        supplier.is_verified = verified;
        if verified {
            self.stats.total_verified_suppliers += 1;
        } else {
            self.stats.total_verified_suppliers -= 1;
        }
        Ok(())
    }

    // ---- Queries ----

    pub fn supplier(&self, name: &str) -> Result<&Supplier, LedgerError> {
        self.suppliers
            .get(name)
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))
    }

    fn supplier_mut(&mut self, name: &str) -> Result<&mut Supplier, LedgerError> {
        self.suppliers
            .get_mut(name)
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))
    }

    pub fn supplier_names(&self) -> &[String] {
        &self.registration_order
    }

    pub fn reviews(&self, supplier_name: &str) -> &[Review] {
        self.reviews
            .get(supplier_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn user_ratings(&self, caller: &CallerId) -> &[String] {
        self.user_ratings
            .get(caller)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_rated(&self, caller: &CallerId, supplier_name: &str) -> bool {
        self.rated.contains(&(*caller, supplier_name.to_string()))
    }

    pub fn stats(&self) -> PlatformStats {
        self.stats
    }

    pub fn summaries(&self) -> Vec<SupplierSummary> {
        self.registration_order
            .iter()
            .filter_map(|name| self.suppliers.get(name))
            .map(Supplier::summary)
            .collect()
    }
}
