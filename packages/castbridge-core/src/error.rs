//! Centralized error types for the castbridge core library.
//!
//! Each concern defines its own `thiserror` enum next to the code that
//! produces it; this module gathers them, provides machine-readable codes and
//! the application-wide [`BridgeError`].

use serde::Serialize;
use thiserror::Error;

use crate::mpris::TransportError;
use crate::receiver::discovery::DiscoveryError;
use crate::receiver::ReceiverError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::MdnsDaemon(_) => "mdns_daemon_failed",
            Self::BrowseClosed => "mdns_browse_closed",
        }
    }
}

impl ErrorCode for ReceiverError {
    fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "receiver_timeout",
            Self::Operation(_) => "receiver_operation_failed",
            Self::UnsolicitedClose(_) => "receiver_unsolicited_close",
        }
    }
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Bus(_) => "dbus_error",
        }
    }
}

/// Application-wide error type for the castbridge service.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum BridgeError {
    /// Receiver discovery failed (mDNS daemon issues).
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// A receiver request failed, timed out or its channel closed.
    #[error("Receiver error: {0}")]
    Receiver(String),

    /// Desktop bus transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorCode for BridgeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery_failed",
            Self::Receiver(_) => "receiver_error",
            Self::Transport(_) => "transport_error",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

// Re-export Result type aliases from their defining modules
pub use crate::mpris::TransportResult;
pub use crate::receiver::discovery::DiscoveryResult;
pub use crate::receiver::ReceiverResult;

/// Convenient Result alias for application-wide operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<DiscoveryError> for BridgeError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err.to_string())
    }
}

impl From<ReceiverError> for BridgeError {
    fn from(err: ReceiverError) -> Self {
        Self::Receiver(err.to_string())
    }
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::Channel;
    use std::time::Duration;

    #[test]
    fn receiver_errors_map_to_codes() {
        assert_eq!(
            ReceiverError::Timeout(Duration::from_secs(5)).code(),
            "receiver_timeout"
        );
        assert_eq!(
            ReceiverError::UnsolicitedClose(Channel::Session).code(),
            "receiver_unsolicited_close"
        );
    }

    #[test]
    fn conversion_keeps_message() {
        let err: BridgeError = ReceiverError::Operation("launch refused".into()).into();
        assert_eq!(err.code(), "receiver_error");
        assert!(err.to_string().contains("launch refused"));
    }

    #[test]
    fn configuration_error_serializes_with_tag() {
        let err = BridgeError::Configuration("bad player name".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "Configuration");
        assert_eq!(json["details"], "bad player name");
    }
}
