//! mDNS/Bonjour-based receiver discovery.
//!
//! Uses DNS-SD to browse for `_googlecast._tcp.local.` services.
//!
//! # Key Design Points
//!
//! - Uses resolved record data (IP from SRV/A answers), never string parsing
//! - Friendly name from the `fn` TXT record, falling back to the instance name
//! - Calls `stop_browse()` when the search resolves or is dropped, so a
//!   cancelled `Discovering` phase leaves no daemon work behind

use std::sync::Arc;

use async_trait::async_trait;
use mdns_sd::{ResolvedService, ScopedIp, ServiceDaemon, ServiceEvent};

use super::{DiscoveryError, DiscoveryResult};
use crate::protocol_constants::{CAST_DEFAULT_PORT, CAST_SERVICE_TYPE};
use crate::receiver::traits::ReceiverDiscovery;
use crate::receiver::types::DeviceAddress;

/// Discovers receivers using mDNS/Bonjour.
pub struct MdnsDiscovery {
    daemon: Arc<ServiceDaemon>,
}

impl MdnsDiscovery {
    /// Creates a discovery backed by a shared daemon.
    pub fn new(daemon: Arc<ServiceDaemon>) -> Self {
        Self { daemon }
    }
}

/// Stops browsing when dropped.
struct BrowseGuard<'a> {
    daemon: &'a ServiceDaemon,
}

impl Drop for BrowseGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.stop_browse(CAST_SERVICE_TYPE) {
            log::warn!("[mDNS] Failed to stop browse: {:?}", e);
        }
    }
}

#[async_trait]
impl ReceiverDiscovery for MdnsDiscovery {
    async fn find_first(&self) -> DiscoveryResult<DeviceAddress> {
        log::info!("[mDNS] Browsing for {}", CAST_SERVICE_TYPE);

        let receiver = self
            .daemon
            .browse(CAST_SERVICE_TYPE)
            .map_err(|e| DiscoveryError::MdnsDaemon(e.to_string()))?;
        let _guard = BrowseGuard {
            daemon: &self.daemon,
        };

        loop {
            match receiver.recv_async().await {
                Ok(ServiceEvent::ServiceResolved(info)) => {
                    log::trace!("[mDNS] Service resolved: {:?}", info.fullname);
                    if let Some(address) = parse_cast_service(&info) {
                        log::info!("[mDNS] Found receiver {}", address);
                        return Ok(address);
                    }
                    log::debug!("[mDNS] Ignoring {} (no IPv4 address)", info.fullname);
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("[mDNS] Receiver channel closed: {:?}", e);
                    return Err(DiscoveryError::BrowseClosed);
                }
            }
        }
    }
}

/// Parses a resolved mDNS service into a receiver address.
///
/// Services without an IPv4 address are skipped.
fn parse_cast_service(info: &ResolvedService) -> Option<DeviceAddress> {
    let ip = info.addresses.iter().find_map(|addr| match addr {
        ScopedIp::V4(v4) => Some(*v4.addr()),
        ScopedIp::V6(_) | _ => None,
    })?;

    let port = if info.port > 0 {
        info.port
    } else {
        CAST_DEFAULT_PORT
    };

    let friendly_name = info
        .txt_properties
        .get_property_val_str("fn")
        .map(str::to_string)
        .or_else(|| instance_name(&info.fullname));

    Some(DeviceAddress {
        ip,
        port,
        friendly_name,
    })
}

/// Extracts the instance label from a full service name.
///
/// `Chromecast-1a2b._googlecast._tcp.local.` becomes `Chromecast-1a2b`.
fn instance_name(fullname: &str) -> Option<String> {
    let name = fullname.strip_suffix(CAST_SERVICE_TYPE)?;
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Creates a new mDNS service daemon.
///
/// This should be called once and the daemon reused across discovery calls.
/// The daemon spawns a background thread for mDNS operations.
pub fn create_daemon() -> Result<ServiceDaemon, DiscoveryError> {
    ServiceDaemon::new().map_err(|e| DiscoveryError::MdnsDaemon(e.to_string()))
}
