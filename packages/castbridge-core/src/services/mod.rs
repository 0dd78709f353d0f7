//! Application services layer.
//!
//! This module contains the services that orchestrate between the receiver
//! side (`receiver/`) and the desktop side (`mpris/`).

pub mod bridge_adapter;
pub mod connection_machine;

pub use bridge_adapter::BridgeAdapter;
pub use connection_machine::{
    Command, ConnectionHandle, ConnectionPhase, ConnectionStateMachine, PlayerCommand,
};
