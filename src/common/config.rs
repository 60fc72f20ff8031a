use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::EscrowError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub data_dir: PathBuf,

    // Resend of unacknowledged mailbox messages. Delay doubles every attempt
    pub resend_delay: Duration,
    pub max_resends: u32,

    pub trader_request_channel_size: usize,
    pub trader_peer_channel_size: usize,
    pub trader_chain_channel_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("escrow_data/"),
            resend_delay: Duration::from_secs(15 * 60),
            max_resends: 10,
            trader_request_channel_size: 10,
            trader_peer_channel_size: 20,
            trader_chain_channel_size: 20,
        }
    }
}

impl ProtocolConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EscrowError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        debug!(
            "Loading protocol config from path: {} - {}",
            path.as_ref().display(),
            &json
        );
        let config: ProtocolConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn trades_dir(&self) -> PathBuf {
        self.data_dir.join("trades/")
    }

    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "max_resends": 3, "resend_delay": { "secs": 5, "nanos": 0 } }"#;
        let config: ProtocolConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_resends, 3);
        assert_eq!(config.resend_delay, Duration::from_secs(5));
        assert_eq!(
            config.trader_peer_channel_size,
            ProtocolConfig::default().trader_peer_channel_size
        );
        assert_eq!(config.data_dir, PathBuf::from("escrow_data/"));
    }

    #[test]
    fn test_trades_dir_nested_in_data_dir() {
        let config = ProtocolConfig::default().with_data_dir("/tmp/escrow");
        assert_eq!(config.trades_dir(), PathBuf::from("/tmp/escrow/trades/"));
    }

    #[test]
    fn test_load_config_file() {
        let path = std::env::temp_dir().join(format!("escrow-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{ "data_dir": "/var/lib/escrow", "max_resends": 4, "trader_peer_channel_size": 64 }"#,
        )
        .unwrap();

        let config = ProtocolConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/escrow"));
        assert_eq!(config.max_resends, 4);
        assert_eq!(config.trader_peer_channel_size, 64);
        assert_eq!(config.resend_delay, ProtocolConfig::default().resend_delay);
        std::fs::remove_file(&path).unwrap();

        assert!(ProtocolConfig::load(&path).is_err());
    }
}
