//! Trait abstractions for the desktop bus side.
//!
//! [`DesktopTransport`] is what the bridge adapter needs from the bus, and
//! [`PlayerMethods`] is what the bus needs from the adapter. The zbus
//! implementation in [`super::dbus`] sits between the two.

use async_trait::async_trait;
use thiserror::Error;

use crate::mpris::properties::{DesktopProperties, PropertyName};

/// Errors from the desktop bus transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// D-Bus call or signal emission failed.
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),
}

/// Convenient Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Outgoing side of the desktop bus.
#[async_trait]
pub trait DesktopTransport: Send + Sync {
    /// Claims the player's well-known bus name.
    async fn request_name(&self) -> TransportResult<()>;

    /// Gives the well-known bus name back.
    async fn release_name(&self) -> TransportResult<()>;

    /// Broadcasts one `PropertiesChanged` signal carrying `changed`, with
    /// values taken from `properties`.
    async fn properties_changed(
        &self,
        properties: &DesktopProperties,
        changed: &[PropertyName],
    ) -> TransportResult<()>;

    /// Emits `Seeked` with the new position in microseconds.
    async fn seeked(&self, position: i64) -> TransportResult<()>;
}

/// Incoming side: player interface methods and property reads.
pub trait PlayerMethods: Send + Sync {
    /// Current property snapshot.
    fn properties(&self) -> DesktopProperties;

    fn next(&self);

    fn previous(&self);

    fn pause(&self);

    fn play_pause(&self);

    fn stop(&self);

    fn play(&self);

    /// Seeks by `offset` microseconds relative to the current position.
    fn seek(&self, offset: i64);

    /// Seeks to `position` microseconds within `track_id`.
    fn set_position(&self, track_id: &str, position: i64);

    fn open_uri(&self, uri: &str);
}
