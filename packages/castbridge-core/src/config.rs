//! Bridge configuration.
//!
//! [`BridgeConfig`] is the configuration surface consumed by the core: the
//! three timings that drive the connection state machine plus the naming and
//! channel parameters of the desktop side.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::MPRIS_BUS_NAME_PREFIX;
use crate::utils::validate_bus_name_element;

/// Configuration for the castbridge core.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    // Receiver
    /// Upper bound for every single receiver request: connect, list sessions,
    /// join and get-status (milliseconds).
    pub connect_timeout_ms: u64,

    /// Delay between two status polls of a joined session (milliseconds).
    pub poll_interval_ms: u64,

    /// Delay before retrying after "nothing to do yet" outcomes: no eligible
    /// session, discovery daemon failure, reconnect from idle (milliseconds).
    pub retry_interval_ms: u64,

    // Desktop
    /// Player name appended to `org.mpris.MediaPlayer2.`.
    pub player_name: String,

    /// Capacity of the connection event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            poll_interval_ms: 1000,
            retry_interval_ms: 5000,
            player_name: "chromecast".to_string(),
            event_channel_capacity: 100,
        }
    }
}

impl BridgeConfig {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be >= 1".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be >= 1".to_string());
        }
        if self.retry_interval_ms == 0 {
            return Err("retry_interval_ms must be >= 1".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        validate_bus_name_element(&self.player_name)
    }

    /// Timeout applied to each receiver request.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Delay between status polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Delay between retries.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Well-known bus name requested while a session is joined.
    pub fn bus_name(&self) -> String {
        format!("{}{}", MPRIS_BUS_NAME_PREFIX, self.player_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bus_name(), "org.mpris.MediaPlayer2.chromecast");
    }

    #[test]
    fn config_rejects_zero_timings() {
        for config in [
            BridgeConfig {
                connect_timeout_ms: 0,
                ..Default::default()
            },
            BridgeConfig {
                poll_interval_ms: 0,
                ..Default::default()
            },
            BridgeConfig {
                retry_interval_ms: 0,
                ..Default::default()
            },
            BridgeConfig {
                event_channel_capacity: 0,
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn config_rejects_invalid_player_name() {
        let config = BridgeConfig {
            player_name: "living room".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn durations_follow_millisecond_fields() {
        let config = BridgeConfig {
            connect_timeout_ms: 250,
            poll_interval_ms: 750,
            retry_interval_ms: 3000,
            ..Default::default()
        };
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.poll_interval(), Duration::from_millis(750));
        assert_eq!(config.retry_interval(), Duration::from_secs(3));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{ "poll_interval_ms": 2000 }"#).unwrap();
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.connect_timeout_ms, 5000);
        assert_eq!(config.player_name, "chromecast");
    }
}
