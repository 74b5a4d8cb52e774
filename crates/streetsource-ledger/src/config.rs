use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use streetsource_fabric::{FabricConfig, SyncMode, WalConfig};
use streetsource_types::CallerId;

/// File name of the event journal inside `data_dir`.
pub const JOURNAL_FILE: &str = "ledger.wal";

/// Settings for opening a [`TrustLedger`](crate::TrustLedger).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub data_dir: PathBuf,
    /// Identity allowed to verify and unverify suppliers.
    pub owner: Option<CallerId>,
    pub node_id: u16,
    pub sync_mode: SyncMode,
    /// Per-subscriber event buffer.
    pub channel_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./streetsource-data"),
            owner: None,
            node_id: 0,
            sync_mode: SyncMode::EveryWrite,
            channel_capacity: 1024,
        }
    }
}

impl LedgerConfig {
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join(JOURNAL_FILE)
    }

    pub fn fabric_config(&self) -> FabricConfig {
        FabricConfig {
            node_id: self.node_id,
            wal: WalConfig {
                sync_mode: self.sync_mode,
            },
            channel_capacity: self.channel_capacity,
        }
    }
}
