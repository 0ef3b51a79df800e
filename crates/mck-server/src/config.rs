use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mck_sdk::{DerivationConfig, FabricConfig, MockchainConfig};

use crate::error::{ServerError, ServerResult};

/// Node settings, read from TOML. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    /// Concurrent derivations.
    pub derivation_workers: usize,
    /// Live events buffered per subscriber before it resyncs from the log.
    pub subscriber_queue_capacity: usize,
    /// Events retained per channel log. Unbounded when absent.
    pub channel_retention: Option<usize>,
    pub default_fund_amount: u64,
    /// SSE heartbeat interval.
    pub keep_alive_secs: u64,
    /// Upper bound on how long a long-poll request waits for an event.
    pub long_poll_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8082)),
            derivation_workers: 8,
            subscriber_queue_capacity: 1024,
            channel_retention: None,
            default_fund_amount: 100_000_000,
            keep_alive_secs: 15,
            long_poll_timeout_ms: 25_000,
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }

    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.long_poll_timeout_ms)
    }

    pub fn mockchain(&self) -> MockchainConfig {
        MockchainConfig {
            fabric: FabricConfig {
                subscriber_capacity: self.subscriber_queue_capacity,
                retention: self.channel_retention,
            },
            derivation: DerivationConfig {
                workers: self.derivation_workers,
                ..DerivationConfig::default()
            },
            default_fund_amount: self.default_fund_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config() {
        let c = NodeConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8082".parse::<SocketAddr>().unwrap());
        assert_eq!(c.derivation_workers, 8);
        assert_eq!(c.subscriber_queue_capacity, 1024);
        assert!(c.channel_retention.is_none());
        assert_eq!(c.default_fund_amount, 100_000_000);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c = NodeConfig::from_toml("derivation_workers = 2\nchannel_retention = 500\n").unwrap();
        assert_eq!(c.derivation_workers, 2);
        assert_eq!(c.channel_retention, Some(500));
        assert_eq!(c.keep_alive_secs, 15);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_addr = \"0.0.0.0:9000\"").unwrap();
        writeln!(file, "long_poll_timeout_ms = 100").unwrap();

        let c = NodeConfig::load(file.path()).unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.long_poll_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn rejects_bad_types() {
        let err = NodeConfig::from_toml("derivation_workers = \"many\"").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ServerError::Io(_)));
    }

    #[test]
    fn toml_round_trip_of_defaults() {
        let c = NodeConfig::default();
        assert_eq!(NodeConfig::from_toml(&c.to_toml().unwrap()).unwrap(), c);
    }

    #[test]
    fn maps_onto_component_configs() {
        let c = NodeConfig {
            derivation_workers: 3,
            subscriber_queue_capacity: 16,
            channel_retention: Some(10),
            ..NodeConfig::default()
        };
        let m = c.mockchain();
        assert_eq!(m.derivation.workers, 3);
        assert_eq!(m.fabric.subscriber_capacity, 16);
        assert_eq!(m.fabric.retention, Some(10));
    }
}
