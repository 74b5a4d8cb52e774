use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hybrid Logical Clock timestamp.
///
/// Every committed ledger event carries one, as do supplier registration
/// times and review timestamps. Ordering is `physical_ms` → `logical` →
/// `node_id`, which gives a total order even when the wall clock stalls.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalAnchor {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events at the same physical time.
    pub logical: u32,
    /// Ledger node that issued the timestamp.
    pub node_id: u16,
}

impl TemporalAnchor {
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    pub const fn zero() -> Self {
        Self {
            physical_ms: 0,
            logical: 0,
            node_id: 0,
        }
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Wall-clock component as a UTC date-time, if representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let ms = i64::try_from(self.physical_ms).ok()?;
        DateTime::from_timestamp_millis(ms)
    }

    /// RFC 3339 rendering of the wall-clock component, used for display.
    pub fn to_rfc3339(&self) -> String {
        self.datetime()
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .unwrap_or_else(|| self.to_string())
    }
}

impl PartialOrd for TemporalAnchor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TemporalAnchor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl fmt::Debug for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TemporalAnchor({}ms.{}.n{})",
            self.physical_ms, self.logical, self.node_id
        )
    }
}

impl fmt::Display for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.n{}", self.physical_ms, self.logical, self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_physical_then_logical_then_node() {
        assert!(TemporalAnchor::new(100, 5, 1) < TemporalAnchor::new(200, 0, 0));
        assert!(TemporalAnchor::new(100, 1, 9) < TemporalAnchor::new(100, 2, 0));
        assert!(TemporalAnchor::new(100, 1, 1) < TemporalAnchor::new(100, 1, 2));
    }

    #[test]
    fn zero_is_smallest() {
        assert!(TemporalAnchor::zero() < TemporalAnchor::new(1, 0, 0));
        assert!(!TemporalAnchor::zero().is_after(&TemporalAnchor::zero()));
    }

    #[test]
    fn rfc3339_rendering() {
        let anchor = TemporalAnchor::new(1_700_000_000_123, 4, 0);
        assert_eq!(anchor.to_rfc3339(), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn unrepresentable_time_falls_back_to_display() {
        let anchor = TemporalAnchor::new(u64::MAX, 0, 3);
        assert!(anchor.datetime().is_none());
        assert_eq!(anchor.to_rfc3339(), format!("{}.0.n3", u64::MAX));
    }

    #[test]
    fn display_format() {
        assert_eq!(TemporalAnchor::new(1000, 5, 3).to_string(), "1000.5.n3");
    }
}
