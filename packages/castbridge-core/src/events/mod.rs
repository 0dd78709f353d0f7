//! Event system connecting the connection state machine to its observers.
//!
//! This module provides:
//! - [`EventEmitter`] trait for the state machine to emit events
//! - [`BroadcastEventBridge`] delivering events over a broadcast channel
//! - [`ConnectionEvent`], the explicit enumeration of lifecycle events

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::receiver::{Capabilities, SessionDescriptor, StatusSnapshot};
use crate::services::ConnectionPhase;

/// Events broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Events from the receiver connection lifecycle.
    Connection(ConnectionEvent),
}

/// Lifecycle events of the receiver connection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConnectionEvent {
    /// A session was joined and is now being polled.
    Connected {
        /// The joined session.
        session: SessionDescriptor,
        /// What the joined player accepts.
        capabilities: Capabilities,
    },
    /// The joined session was left, for whatever reason.
    Disconnected,
    /// A status poll succeeded.
    Status(StatusSnapshot),
    /// The machine moved from one phase to another.
    PhaseChanged {
        from: ConnectionPhase,
        to: ConnectionPhase,
    },
}

impl From<ConnectionEvent> for BroadcastEvent {
    fn from(event: ConnectionEvent) -> Self {
        BroadcastEvent::Connection(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_change_serializes_with_tags() {
        let event: BroadcastEvent = ConnectionEvent::PhaseChanged {
            from: ConnectionPhase::Discovering,
            to: ConnectionPhase::Connecting,
        }
        .into();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["category"], "connection");
        assert_eq!(json["type"], "phaseChanged");
        assert_eq!(json["from"], "discovering");
        assert_eq!(json["to"], "connecting");
    }
}
