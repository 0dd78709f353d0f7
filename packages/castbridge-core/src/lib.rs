//! Castbridge Core - exposes a Chromecast receiver as an MPRIS media player.
//!
//! The crate keeps a long-lived connection to one receiver on the local
//! network and mirrors its playback state onto the desktop media-player
//! interface, forwarding desktop commands back to the receiver.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`receiver`]: Receiver discovery (mDNS) and the Cast wire client
//! - [`services`]: Connection state machine and the MPRIS bridge adapter
//! - [`mpris`]: Desktop properties, status translation and D-Bus transport
//! - [`events`]: Event system connecting the state machine to its observers
//! - [`config`]: Timing and naming configuration
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple core logic from the wire
//! protocols:
//!
//! - [`ReceiverDiscovery`], [`ReceiverConnector`], [`ReceiverConnection`],
//!   [`ReceiverPlayer`]: the receiver side
//! - [`DesktopTransport`](mpris::DesktopTransport),
//!   [`PlayerMethods`](mpris::PlayerMethods): the desktop side
//! - [`EventEmitter`](events::EventEmitter): Emitting lifecycle events

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod mpris;
pub mod protocol_constants;
pub mod receiver;
pub mod services;
pub mod utils;

// Re-export commonly used types at the crate root
pub use config::BridgeConfig;
pub use error::{
    BridgeError, BridgeResult, DiscoveryResult, ErrorCode, ReceiverResult, TransportResult,
};
pub use events::{BroadcastEvent, BroadcastEventBridge, ConnectionEvent, EventEmitter};
pub use utils::now_millis;

// Re-export receiver types
pub use receiver::{
    Capabilities, DeviceAddress, ReceiverConnection, ReceiverConnector, ReceiverDiscovery,
    ReceiverPlayer, SessionDescriptor, StatusSnapshot,
};

// Re-export service types
pub use services::{BridgeAdapter, ConnectionHandle, ConnectionPhase, ConnectionStateMachine};

// Re-export MPRIS types
pub use mpris::{translate, DesktopProperties, PlaybackStatus};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};
