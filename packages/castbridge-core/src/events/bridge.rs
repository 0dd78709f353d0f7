//! Bridge implementation that maps lifecycle events to a broadcast channel.
//!
//! The [`BroadcastEventBridge`] lives at the boundary between the connection
//! state machine and its observers (the MPRIS bridge adapter, logging).

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{BroadcastEvent, ConnectionEvent};

/// Bridges lifecycle events to a broadcast channel.
///
/// This adapter implements [`EventEmitter`] by forwarding events to
/// a `tokio::sync::broadcast` channel that observers subscribe to.
///
/// The bridge also forwards to an optional external emitter that can be set
/// after construction (e.g. [`super::LoggingEventEmitter`]).
///
/// # Thread Safety
///
/// The bridge is `Send + Sync` and can be shared across async tasks.
/// The external emitter uses `RwLock` to allow setting it after construction.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter that receives every event as well.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn emit_connection(&self, event: ConnectionEvent) {
        if let Some(ref emitter) = *self.external_emitter.read() {
            emitter.emit_connection(event.clone());
        }
        if let Err(e) = self.tx.send(BroadcastEvent::Connection(event)) {
            log::trace!("[EventBridge] No broadcast receivers: {}", e);
        }
    }
}
