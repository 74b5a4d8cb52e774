use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use streetsource_ledger::LedgerConfig;

use crate::error::{ServerError, ServerResult};

/// Top-level configuration file: a `[ledger]` and a `[server]` table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ledger: LedgerConfig,
    pub server: HttpConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: SocketAddr,
    /// Request header carrying the caller identity.
    pub caller_header: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8088)),
            caller_header: "x-caller-id".into(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use streetsource_fabric::SyncMode;
    use streetsource_types::CallerId;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.server.bind_addr, "127.0.0.1:8088".parse::<SocketAddr>().unwrap());
        assert_eq!(c.server.caller_header, "x-caller-id");
        assert!(c.ledger.owner.is_none());
    }

    #[test]
    fn parses_full_file() {
        let owner = CallerId::account("platform-owner");
        let text = format!(
            r#"
            [ledger]
            data_dir = "/var/lib/streetsource"
            owner = "id:{}"
            node_id = 3
            sync_mode = "os-default"
            channel_capacity = 64

            [server]
            bind_addr = "0.0.0.0:9000"
            caller_header = "x-streetsource-caller"
            "#,
            owner.to_hex()
        );
        let c = ServerConfig::from_toml_str(&text).unwrap();
        assert_eq!(c.ledger.data_dir, PathBuf::from("/var/lib/streetsource"));
        assert_eq!(c.ledger.owner, Some(owner));
        assert_eq!(c.ledger.node_id, 3);
        assert_eq!(c.ledger.sync_mode, SyncMode::OsDefault);
        assert_eq!(c.ledger.channel_capacity, 64);
        assert_eq!(c.server.bind_addr.port(), 9000);
        assert_eq!(c.server.caller_header, "x-streetsource-caller");
    }

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let c = ServerConfig::from_toml_str("[server]\nbind_addr = \"127.0.0.1:1\"\n").unwrap();
        assert_eq!(c.ledger, LedgerConfig::default());
        assert_eq!(c.server.caller_header, "x-caller-id");
    }

    #[test]
    fn bad_owner_is_a_config_error() {
        let err = ServerConfig::from_toml_str("[ledger]\nowner = \"zz\"\n").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streetsource.toml");
        let mut config = ServerConfig::default();
        config.ledger.owner = Some(CallerId::account("owner"));
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap(), config);
    }
}
