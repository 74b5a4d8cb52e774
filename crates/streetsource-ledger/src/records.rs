use serde::Serialize;
use streetsource_types::{CallerId, TemporalAnchor};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// Average of `sum / count` scaled by 100 and rounded half up, in integer
/// arithmetic: `(200 * sum + count) / (2 * count)`. Zero when `count == 0`.
///
/// Consumers divide by 100 for display (400 ⇒ 4.00 stars).
pub fn scaled_average(sum: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    (200 * sum + count) / (2 * count)
}

/// A registered supplier, keyed by its unique display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Supplier {
    /// Unique, non-empty display name.
    pub name: String,
    pub description: String,
    /// Free-form contact details supplied at registration.
    pub contact_info: String,
    /// Set and cleared only by the platform owner.
    pub is_verified: bool,
    pub registration_time: TemporalAnchor,
    /// Number of reviews received.
    pub total_ratings: u64,
    /// Sum of all scores; the average is derived from it.
    #[serde(skip)]
    pub(crate) rating_sum: u64,
}

impl Supplier {
    pub(crate) fn new(
        name: String,
        description: String,
        contact_info: String,
        registration_time: TemporalAnchor,
    ) -> Self {
        Self {
            name,
            description,
            contact_info,
            is_verified: false,
            registration_time,
            total_ratings: 0,
            rating_sum: 0,
        }
    }

    /// Average rating ×100.
    pub fn avg_rating(&self) -> u64 {
        scaled_average(self.rating_sum, self.total_ratings)
    }

    pub fn rating(&self) -> SupplierRating {
        SupplierRating {
            avg_rating: self.avg_rating(),
            total_ratings: self.total_ratings,
        }
    }

    pub fn summary(&self) -> SupplierSummary {
        SupplierSummary {
            name: self.name.clone(),
            is_verified: self.is_verified,
            avg_rating: self.avg_rating(),
            total_ratings: self.total_ratings,
        }
    }
}

/// One rater's immutable review of one supplier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Review {
    pub reviewer: CallerId,
    pub supplier_name: String,
    /// Between `MIN_SCORE` and `MAX_SCORE`.
    pub score: u8,
    /// Non-empty review text.
    pub comment: String,
    /// When the rating was committed.
    pub timestamp: TemporalAnchor,
    /// Supplier's verification flag when the review was written.
    pub verified: bool,
}

/// Aggregate rating of one supplier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SupplierRating {
    /// Average score ×100, rounded half up; 0 when unrated.
    pub avg_rating: u64,
    /// Number of reviews behind the average.
    pub total_ratings: u64,
}

/// Platform-wide counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    /// Registered suppliers.
    pub total_suppliers: u64,
    /// Ratings across all suppliers.
    pub total_ratings: u64,
    /// Suppliers whose verification flag is currently set.
    pub total_verified_suppliers: u64,
}

/// Listing row for dashboards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SupplierSummary {
    pub name: String,
    pub is_verified: bool,
    /// Average score ×100.
    pub avg_rating: u64,
    pub total_ratings: u64,
}
