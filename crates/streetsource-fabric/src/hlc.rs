use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use streetsource_types::TemporalAnchor;

/// Source of event timestamps.
///
/// Injected into the fabric so tests can pin time; production uses
/// [`HybridLogicalClock`].
pub trait Clock: Send + Sync {
    /// A timestamp strictly greater than any this clock returned before.
    fn now(&self) -> TemporalAnchor;

    /// Advance past a timestamp seen elsewhere (e.g. the last journaled
    /// event on restart), so later `now()` calls sort after it.
    fn observe(&self, seen: &TemporalAnchor);
}

struct HlcState {
    physical_ms: u64,
    logical: u32,
}

/// Hybrid Logical Clock.
///
/// Combines wall-clock time with a logical counter so timestamps stay
/// strictly monotonic even when the wall clock stalls or steps backwards.
///
/// - **Local event**: `physical = max(wall_clock, state.physical)`; the
///   logical counter resets when physical advanced and increments otherwise.
/// - **Observe**: the state jumps to `seen` when `seen` is ahead.
pub struct HybridLogicalClock {
    node_id: u16,
    state: Mutex<HlcState>,
}

impl HybridLogicalClock {
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            state: Mutex::new(HlcState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    fn wall_clock_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

impl Clock for HybridLogicalClock {
    fn now(&self) -> TemporalAnchor {
        let wall = Self::wall_clock_ms();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let new_physical = wall.max(state.physical_ms);
        let new_logical = if new_physical > state.physical_ms {
            0
        } else {
            state.logical + 1
        };

        state.physical_ms = new_physical;
        state.logical = new_logical;

        TemporalAnchor::new(new_physical, new_logical, self.node_id)
    }

    fn observe(&self, seen: &TemporalAnchor) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if (seen.physical_ms, seen.logical) > (state.physical_ms, state.logical) {
            state.physical_ms = seen.physical_ms;
            state.logical = seen.logical;
        }
    }
}

/// Deterministic clock for tests: a fixed physical time that only moves when
/// told to, with the logical counter keeping timestamps unique.
pub struct ManualClock {
    node_id: u16,
    state: Mutex<HlcState>,
}

impl ManualClock {
    pub fn new(physical_ms: u64) -> Self {
        Self {
            node_id: 0,
            state: Mutex::new(HlcState {
                physical_ms,
                logical: 0,
            }),
        }
    }

    /// Move the physical component forward by `ms` and reset the counter.
    pub fn advance(&self, ms: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.physical_ms = state.physical_ms.saturating_add(ms);
        state.logical = 0;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TemporalAnchor {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let anchor = TemporalAnchor::new(state.physical_ms, state.logical, self.node_id);
        state.logical += 1;
        anchor
    }

    fn observe(&self, seen: &TemporalAnchor) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if (seen.physical_ms, seen.logical) >= (state.physical_ms, state.logical) {
            state.physical_ms = seen.physical_ms;
            state.logical = seen.logical + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_across_rapid_calls() {
        let hlc = HybridLogicalClock::new(1);
        let mut prev = hlc.now();
        for _ in 0..1000 {
            let next = hlc.now();
            assert!(next > prev, "HLC must be strictly monotonic: {prev:?} >= {next:?}");
            prev = next;
        }
    }

    #[test]
    fn logical_increments_when_wall_clock_lags() {
        let hlc = HybridLogicalClock::new(1);
        hlc.observe(&TemporalAnchor::new(u64::MAX, 0, 9));

        let t1 = hlc.now();
        let t2 = hlc.now();
        assert_eq!(t1.physical_ms, u64::MAX);
        assert_eq!(t1.logical, 1);
        assert_eq!(t2.logical, 2);
        assert_eq!(t1.node_id, 1);
    }

    #[test]
    fn observe_ignores_older_timestamps() {
        let hlc = HybridLogicalClock::new(1);
        let before = hlc.now();
        hlc.observe(&TemporalAnchor::new(1, 0, 0));
        assert!(hlc.now() > before);
    }

    #[test]
    fn manual_clock_is_deterministic() {
        let clock = ManualClock::new(5_000);
        assert_eq!(clock.now(), TemporalAnchor::new(5_000, 0, 0));
        assert_eq!(clock.now(), TemporalAnchor::new(5_000, 1, 0));
        clock.advance(10);
        assert_eq!(clock.now(), TemporalAnchor::new(5_010, 0, 0));
    }

    #[test]
    fn manual_clock_observe_moves_past_seen() {
        let clock = ManualClock::new(100);
        let seen = TemporalAnchor::new(200, 4, 0);
        clock.observe(&seen);
        assert!(clock.now() > seen);
    }

    #[test]
    fn concurrent_now_calls_are_unique() {
        use std::sync::Arc;
        use std::thread;

        let hlc = Arc::new(HybridLogicalClock::new(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hlc = Arc::clone(&hlc);
                thread::spawn(move || (0..100).map(|_| hlc.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<TemporalAnchor> = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let len = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), len);
    }
}
