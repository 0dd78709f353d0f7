//! Desktop side of the bridge: MPRIS properties, translation and bus transport.

pub mod dbus;
pub mod properties;
pub mod translator;
pub mod transport;

pub use dbus::{serve, ZbusTransport};
pub use properties::{DesktopProperties, LoopStatus, Metadata, PlaybackStatus, PropertyName};
pub use translator::{translate, Seeked, Translation};
pub use transport::{DesktopTransport, PlayerMethods, TransportError, TransportResult};
