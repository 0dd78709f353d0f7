//! Event emitter abstraction for decoupling the state machine from delivery.
//!
//! The connection state machine depends on the [`EventEmitter`] trait rather
//! than a concrete broadcast channel, enabling testing and alternative
//! delivery implementations.

use super::ConnectionEvent;

/// Trait for emitting lifecycle events without knowledge of delivery.
///
/// # Example
///
/// ```ignore
/// struct Machine {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl Machine {
///     fn left_session(&self) {
///         self.emitter.emit_connection(ConnectionEvent::Disconnected);
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a connection lifecycle event.
    fn emit_connection(&self, event: ConnectionEvent);
}

/// No-op emitter for testing.
///
/// Events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_connection(&self, _event: ConnectionEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_connection(&self, event: ConnectionEvent) {
        tracing::debug!(?event, "connection_event");
    }
}
