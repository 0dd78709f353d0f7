//! Daemon configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;

use anyhow::{bail, Context, Result};
use castbridge_core::{BridgeConfig, DeviceAddress};
use serde::Deserialize;

/// Daemon configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Timeout of every receiver request in milliseconds.
    /// Override: `CASTBRIDGE_CONNECT_TIMEOUT_MS`
    pub connect_timeout_ms: u64,

    /// Status poll interval in milliseconds.
    /// Override: `CASTBRIDGE_POLL_INTERVAL_MS`
    pub poll_interval_ms: u64,

    /// Retry interval in milliseconds.
    /// Override: `CASTBRIDGE_RETRY_INTERVAL_MS`
    pub retry_interval_ms: u64,

    /// Suffix of the `org.mpris.MediaPlayer2.<name>` bus name.
    /// Override: `CASTBRIDGE_PLAYER_NAME`
    pub player_name: String,

    /// Fixed receiver address (`ip` or `ip:port`). mDNS discovery is used
    /// when unset.
    pub receiver: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let core = BridgeConfig::default();
        Self {
            connect_timeout_ms: core.connect_timeout_ms,
            poll_interval_ms: core.poll_interval_ms,
            retry_interval_ms: core.retry_interval_ms,
            player_name: core.player_name,
            receiver: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides looked up by environment variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let millis = |key: &str| lookup(key).and_then(|val| val.parse().ok());

        if let Some(ms) = millis("CASTBRIDGE_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = ms;
        }
        if let Some(ms) = millis("CASTBRIDGE_POLL_INTERVAL_MS") {
            self.poll_interval_ms = ms;
        }
        if let Some(ms) = millis("CASTBRIDGE_RETRY_INTERVAL_MS") {
            self.retry_interval_ms = ms;
        }
        if let Some(name) = lookup("CASTBRIDGE_PLAYER_NAME") {
            self.player_name = name;
        }

        // Note: CASTBRIDGE_RECEIVER is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to castbridge-core's config type.
    pub fn to_core_config(&self) -> BridgeConfig {
        BridgeConfig {
            connect_timeout_ms: self.connect_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
            retry_interval_ms: self.retry_interval_ms,
            player_name: self.player_name.clone(),
            ..Default::default()
        }
    }

    /// Parses the fixed receiver address, if one is configured.
    pub fn receiver_address(&self) -> Result<Option<DeviceAddress>> {
        self.receiver.as_deref().map(parse_receiver).transpose()
    }
}

/// Parses `ip` or `ip:port`.
fn parse_receiver(value: &str) -> Result<DeviceAddress> {
    let value = value.trim();
    if let Ok(ip) = value.parse::<Ipv4Addr>() {
        return Ok(DeviceAddress::new(ip));
    }
    match value.parse::<SocketAddrV4>() {
        Ok(addr) => Ok(DeviceAddress {
            port: addr.port(),
            ..DeviceAddress::new(*addr.ip())
        }),
        Err(_) => bail!("Invalid receiver address `{}` (expected ip or ip:port)", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_core_config() {
        let config = AppConfig::default();
        assert_eq!(config.to_core_config(), BridgeConfig::default());
        assert!(config.receiver_address().unwrap().is_none());
    }

    #[test]
    fn loads_yaml_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms: 250\nreceiver: \"192.168.1.20:8010\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.connect_timeout_ms, 5000);

        let address = config.receiver_address().unwrap().unwrap();
        assert_eq!(address.ip, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(address.port, 8010);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("absent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms: [not, a, number]").unwrap();
        assert!(AppConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CASTBRIDGE_CONNECT_TIMEOUT_MS", "1500"),
            ("CASTBRIDGE_RETRY_INTERVAL_MS", "oops"),
            ("CASTBRIDGE_PLAYER_NAME", "livingroom"),
        ]);
        let mut config = AppConfig {
            retry_interval_ms: 7000,
            ..Default::default()
        };
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.connect_timeout_ms, 1500);
        assert_eq!(config.retry_interval_ms, 7000);
        assert_eq!(config.player_name, "livingroom");
        assert_eq!(
            config.to_core_config().bus_name(),
            "org.mpris.MediaPlayer2.livingroom"
        );
    }

    #[test]
    fn receiver_accepts_bare_ip() {
        let address = parse_receiver("10.0.0.7").unwrap();
        assert_eq!(address.port, 8009);
    }

    #[test]
    fn receiver_rejects_hostnames() {
        assert!(parse_receiver("chromecast.local").is_err());
    }
}
