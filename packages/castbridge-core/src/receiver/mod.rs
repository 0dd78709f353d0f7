//! Receiver side of the bridge: discovery, wire client and value types.

pub mod cast;
pub mod discovery;
pub mod traits;
pub mod types;

pub use cast::CastConnector;
pub use traits::{ReceiverConnection, ReceiverConnector, ReceiverDiscovery, ReceiverPlayer};
pub use types::{
    select_session, Capabilities, Channel, DeviceAddress, MediaInfo, PlayerState, ReceiverError,
    ReceiverResult, SessionDescriptor, StatusSnapshot, VolumeInfo,
};
