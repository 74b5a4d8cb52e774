use streetsource_types::CallerId;

use crate::error::LedgerError;
use crate::records::{PlatformStats, Review, Supplier, SupplierRating, SupplierSummary};

/// Command boundary: every call is atomic and either fully applies or
/// leaves the ledger untouched.
pub trait LedgerCommands: Send + Sync {
    fn register_supplier(
        &self,
        name: &str,
        description: &str,
        contact_info: &str,
        caller: &CallerId,
    ) -> Result<Supplier, LedgerError>;

    fn add_rating(
        &self,
        supplier_name: &str,
        score: u8,
        comment: &str,
        caller: &CallerId,
    ) -> Result<Review, LedgerError>;

    /// Returns `true` if the flag changed, `false` if it was already set.
    fn verify_supplier(&self, supplier_name: &str, caller: &CallerId) -> Result<bool, LedgerError>;

    /// Returns `true` if the flag changed, `false` if it was already clear.
    fn unverify_supplier(&self, supplier_name: &str, caller: &CallerId)
        -> Result<bool, LedgerError>;
}

/// Read-only query boundary.
pub trait LedgerQueries: Send + Sync {
    /// Supplier names in registration order.
    fn all_suppliers(&self) -> Result<Vec<String>, LedgerError>;

    fn supplier_details(&self, name: &str) -> Result<Supplier, LedgerError>;

    fn supplier_rating(&self, name: &str) -> Result<SupplierRating, LedgerError>;

    /// Reviews in insertion order; empty for unknown suppliers.
    fn supplier_reviews(&self, name: &str) -> Result<Vec<Review>, LedgerError>;

    fn platform_stats(&self) -> Result<PlatformStats, LedgerError>;

    /// Supplier names rated by `caller`, in the order rated.
    fn user_ratings(&self, caller: &CallerId) -> Result<Vec<String>, LedgerError>;

    fn has_rated(&self, caller: &CallerId, supplier_name: &str) -> Result<bool, LedgerError>;

    fn supplier_summaries(&self) -> Result<Vec<SupplierSummary>, LedgerError>;
}
