//! Receiver discovery.
//!
//! - [`MdnsDiscovery`]: browses `_googlecast._tcp.local.` and resolves with
//!   the first receiver that has an IPv4 address
//! - [`StaticDiscovery`]: resolves immediately to a configured address

mod mdns;

pub use mdns::{create_daemon, MdnsDiscovery};

use async_trait::async_trait;
use thiserror::Error;

use crate::receiver::traits::ReceiverDiscovery;
use crate::receiver::types::DeviceAddress;

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// mDNS daemon error.
    #[error("mDNS daemon error: {0}")]
    MdnsDaemon(String),

    /// The daemon stopped delivering browse events.
    #[error("mDNS browse channel closed")]
    BrowseClosed,
}

/// Convenient Result alias for receiver discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Discovery that always yields one fixed address.
///
/// Used when the receiver address is configured manually.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    address: DeviceAddress,
}

impl StaticDiscovery {
    pub fn new(address: DeviceAddress) -> Self {
        Self { address }
    }
}

#[async_trait]
impl ReceiverDiscovery for StaticDiscovery {
    async fn find_first(&self) -> DiscoveryResult<DeviceAddress> {
        log::debug!("[mDNS] Using configured receiver {}", self.address);
        Ok(self.address.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn static_discovery_returns_configured_address() {
        let address = DeviceAddress::new(Ipv4Addr::new(192, 168, 1, 40));
        let discovery = StaticDiscovery::new(address.clone());
        assert_eq!(discovery.find_first().await.unwrap(), address);
    }
}
