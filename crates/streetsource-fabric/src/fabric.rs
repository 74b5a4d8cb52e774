use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{FabricError, Result};
use crate::event::{EventKind, EventPayload, LedgerEvent};
use crate::hlc::{Clock, HybridLogicalClock};
use crate::wal::{WalConfig, WalEntry, WriteAheadLog};

/// Filter for subscribing to a subset of ledger events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events about these suppliers are delivered.
    pub suppliers: Option<Vec<String>>,
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
    /// If set, only events with a greater sequence number are delivered.
    pub after_seq: Option<u64>,
}

impl EventFilter {
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        if let Some(ref names) = self.suppliers {
            if !names.iter().any(|n| n == event.payload.supplier_name()) {
                return false;
            }
        }
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }
        if let Some(after) = self.after_seq {
            if event.seq <= after {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for ledger events.
pub type EventStream = broadcast::Receiver<LedgerEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<LedgerEvent>,
}

/// Fan-out router that delivers events to matching subscribers.
struct EventRouter {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventRouter {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn subscribe(&self, filter: EventFilter, capacity: usize) -> EventStream {
        let (sender, rx) = broadcast::channel(capacity);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { filter, sender });
        rx
    }

    /// Route an event to all matching subscribers, pruning dropped ones.
    fn route(&self, event: &LedgerEvent) {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Configuration for the [`EventFabric`].
#[derive(Clone, Debug)]
pub struct FabricConfig {
    /// Node identifier stamped into every timestamp.
    pub node_id: u16,
    /// Journal settings, including when appends are synced.
    pub wal: WalConfig,
    /// Capacity of per-subscriber broadcast channels.
    pub channel_capacity: usize,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            wal: WalConfig::default(),
            channel_capacity: 1024,
        }
    }
}

/// Durable, ordered event bus.
///
/// `emit` assigns the next sequence number, stamps the event, appends it to
/// the journal and only then routes it to subscribers, all under one lock,
/// so subscribers observe events in commit order and never see an event
/// that is not durable. A subscriber that lagged behind its channel
/// capacity catches up through [`EventFabric::events_since`].
pub struct EventFabric {
    clock: Arc<dyn Clock>,
    wal: WriteAheadLog,
    router: EventRouter,
    last_seq: Mutex<u64>,
    config: FabricConfig,
}

impl EventFabric {
    /// Open the fabric over a journal file with a hybrid logical clock.
    pub fn open(wal_path: &Path, config: FabricConfig) -> Result<Self> {
        let clock = Arc::new(HybridLogicalClock::new(config.node_id));
        Self::open_with_clock(wal_path, config, clock)
    }

    /// Open the fabric with an injected clock.
    ///
    /// The existing journal is scanned once to resume the sequence counter
    /// and to move the clock past the last committed timestamp.
    pub fn open_with_clock(
        wal_path: &Path,
        config: FabricConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let wal = WriteAheadLog::open(wal_path, config.wal.clone())?;
        let last = wal.recover()?.pop().map(|entry| entry.event);

        let last_seq = last.as_ref().map_or(0, |e| e.seq);
        if let Some(event) = &last {
            clock.observe(&event.timestamp);
        }

        info!(node_id = config.node_id, wal_path = %wal_path.display(), last_seq, "fabric started");

        Ok(Self {
            clock,
            wal,
            router: EventRouter::new(),
            last_seq: Mutex::new(last_seq),
            config,
        })
    }

    /// Commit one event: sequence, stamp, journal, then route.
    ///
    /// If the journal append fails nothing is routed and the sequence
    /// number is not consumed.
    pub fn emit(&self, payload: EventPayload) -> Result<LedgerEvent> {
        let mut last_seq = self.last_seq.lock().map_err(|_| FabricError::LockPoisoned)?;

        let seq = *last_seq + 1;
        let event = LedgerEvent::new(seq, self.clock.now(), payload);

        self.wal.append(&WalEntry {
            event: event.clone(),
        })?;
        *last_seq = seq;

        self.router.route(&event);

        debug!(id = %event.id, seq, kind = %event.kind(), "event emitted");
        Ok(event)
    }

    /// Subscribe to live events matching the filter.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.router.subscribe(filter, self.config.channel_capacity)
    }

    /// Every journaled event in commit order.
    pub fn recover(&self) -> Result<Vec<LedgerEvent>> {
        let events: Vec<LedgerEvent> = self.wal.recover()?.into_iter().map(|e| e.event).collect();
        info!(count = events.len(), "recovered events from journal");
        Ok(events)
    }

    /// Journaled events with `seq > after`, in commit order.
    pub fn events_since(&self, after: u64) -> Result<Vec<LedgerEvent>> {
        Ok(self
            .wal
            .recover()?
            .into_iter()
            .map(|e| e.event)
            .filter(|e| e.seq > after)
            .collect())
    }

    /// Sequence number of the most recently committed event (0 if none).
    pub fn last_seq(&self) -> Result<u64> {
        Ok(*self.last_seq.lock().map_err(|_| FabricError::LockPoisoned)?)
    }

    pub fn subscriber_count(&self) -> usize {
        self.router.subscriber_count()
    }

    pub fn journal_path(&self) -> &Path {
        self.wal.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlc::ManualClock;
    use streetsource_types::{CallerId, TemporalAnchor};

    fn registered(name: &str) -> EventPayload {
        EventPayload::SupplierRegistered {
            name: name.into(),
            caller: CallerId::account("vendor"),
            description: "Wholesale spices".into(),
            contact_info: "+91 98200 00000".into(),
        }
    }

    fn verified(name: &str) -> EventPayload {
        EventPayload::SupplierVerified { name: name.into() }
    }

    fn temp_fabric() -> (tempfile::TempDir, std::path::PathBuf, EventFabric) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.wal");
        let fabric = EventFabric::open(&path, FabricConfig::default()).unwrap();
        (dir, path, fabric)
    }

    #[test]
    fn emit_assigns_gap_free_sequence() {
        let (_dir, _path, fabric) = temp_fabric();
        let a = fabric.emit(registered("A")).unwrap();
        let b = fabric.emit(registered("B")).unwrap();
        assert_eq!((a.seq, b.seq), (1, 2));
        assert!(a.timestamp < b.timestamp);
        assert_eq!(fabric.last_seq().unwrap(), 2);
    }

    #[test]
    fn reopen_resumes_sequence_and_clock() {
        let (_dir, path, fabric) = temp_fabric();
        let first = fabric.emit(registered("A")).unwrap();
        drop(fabric);

        let clock = Arc::new(ManualClock::new(0));
        let fabric = EventFabric::open_with_clock(&path, FabricConfig::default(), clock).unwrap();
        let second = fabric.emit(verified("A")).unwrap();

        assert_eq!(second.seq, 2);
        assert!(second.timestamp > first.timestamp);
        assert_eq!(fabric.recover().unwrap().len(), 2);
    }

    #[test]
    fn subscriber_receives_only_matching_events() {
        let (_dir, _path, fabric) = temp_fabric();
        let mut stream = fabric.subscribe(EventFilter {
            kinds: Some(vec![EventKind::SupplierVerified]),
            ..Default::default()
        });
        assert_eq!(fabric.subscriber_count(), 1);

        fabric.emit(registered("A")).unwrap();
        fabric.emit(verified("A")).unwrap();

        let received = stream.try_recv().unwrap();
        assert_eq!(received.kind(), EventKind::SupplierVerified);
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn supplier_filter() {
        let (_dir, _path, fabric) = temp_fabric();
        let mut stream = fabric.subscribe(EventFilter {
            suppliers: Some(vec!["B".into()]),
            ..Default::default()
        });

        fabric.emit(registered("A")).unwrap();
        fabric.emit(registered("B")).unwrap();

        assert_eq!(stream.try_recv().unwrap().payload.supplier_name(), "B");
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let (_dir, _path, fabric) = temp_fabric();
        let stream = fabric.subscribe(EventFilter::default());
        drop(stream);
        fabric.emit(registered("A")).unwrap();
        assert_eq!(fabric.subscriber_count(), 0);
    }

    #[test]
    fn lagging_subscriber_catches_up_from_journal() {
        let dir = tempfile::tempdir().unwrap();
        let config = FabricConfig {
            channel_capacity: 1,
            ..FabricConfig::default()
        };
        let fabric = EventFabric::open(&dir.path().join("lag.wal"), config).unwrap();
        let mut stream = fabric.subscribe(EventFilter::default());

        for name in ["A", "B", "C"] {
            fabric.emit(registered(name)).unwrap();
        }

        assert!(matches!(
            stream.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
        let missed = fabric.events_since(0).unwrap();
        let seqs: Vec<u64> = missed.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(fabric.events_since(2).unwrap().len(), 1);
    }

    #[test]
    fn recovered_events_pass_integrity() {
        let (_dir, _path, fabric) = temp_fabric();
        fabric.emit(registered("A")).unwrap();
        for event in fabric.recover().unwrap() {
            assert!(event.verify_integrity());
        }
    }

    #[test]
    fn filter_after_seq() {
        let event = LedgerEvent::new(5, TemporalAnchor::new(1, 0, 0), verified("A"));
        assert!(EventFilter::default().matches(&event));
        let after = |seq| EventFilter {
            after_seq: Some(seq),
            ..Default::default()
        };
        assert!(after(4).matches(&event));
        assert!(!after(5).matches(&event));
    }

    #[test]
    fn concurrent_emit_keeps_sequence_dense() {
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concurrent.wal");
        let fabric = Arc::new(EventFabric::open(&path, FabricConfig::default()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let fabric = Arc::clone(&fabric);
                thread::spawn(move || {
                    for i in 0..25 {
                        fabric.emit(registered(&format!("S{t}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let seqs: Vec<u64> = fabric.recover().unwrap().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (1..=100).collect::<Vec<_>>());
    }
}
