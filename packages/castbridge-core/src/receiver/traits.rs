//! Trait abstractions for receiver operations.
//!
//! These traits enable dependency injection for testability and modularity.
//! The connection state machine depends on traits rather than the concrete
//! mDNS and Cast implementations.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{DiscoveryResult, ReceiverResult};
use crate::receiver::types::{Capabilities, DeviceAddress, SessionDescriptor, StatusSnapshot};

/// Finds a receiver on the network.
#[async_trait]
pub trait ReceiverDiscovery: Send + Sync {
    /// Watches for receivers and resolves with the first match.
    ///
    /// Does not time out. Dropping the returned future stops watching.
    async fn find_first(&self) -> DiscoveryResult<DeviceAddress>;
}

/// Opens wire connections to receivers.
#[async_trait]
pub trait ReceiverConnector: Send + Sync {
    /// Opens a connection to the receiver at `address`.
    async fn connect(&self, address: &DeviceAddress) -> ReceiverResult<Arc<dyn ReceiverConnection>>;
}

/// An open connection to a receiver.
#[async_trait]
pub trait ReceiverConnection: Send + Sync {
    /// Lists the application sessions currently running on the receiver.
    async fn list_sessions(&self) -> ReceiverResult<Vec<SessionDescriptor>>;

    /// Joins `session` and returns a player for its media channel.
    async fn join(&self, session: &SessionDescriptor) -> ReceiverResult<Arc<dyn ReceiverPlayer>>;

    /// Token cancelled when the connection closes on its own.
    fn closed(&self) -> CancellationToken;

    /// Closes the connection. Does not cancel [`Self::closed`].
    fn close(&self);
}

/// Media channel of a joined session.
#[async_trait]
pub trait ReceiverPlayer: Send + Sync {
    /// Capabilities fixed at join time.
    fn capabilities(&self) -> Capabilities;

    /// Requests the current playback status.
    async fn get_status(&self) -> ReceiverResult<StatusSnapshot>;

    async fn play(&self) -> ReceiverResult<()>;

    async fn pause(&self) -> ReceiverResult<()>;

    async fn stop(&self) -> ReceiverResult<()>;

    /// Seeks to an absolute position in seconds.
    async fn seek(&self, position_seconds: f64) -> ReceiverResult<()>;

    /// Token cancelled when the session closes on its own.
    fn closed(&self) -> CancellationToken;

    /// Closes the media channel. Does not cancel [`Self::closed`].
    fn close(&self);
}
