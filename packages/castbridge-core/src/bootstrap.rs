//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together:
//!
//! - receiver discovery (mDNS, or a fixed address) and the Cast connector
//! - the connection state machine and its event bridge
//! - the MPRIS adapter, exported on the D-Bus session bus

use std::sync::Arc;

use mdns_sd::ServiceDaemon;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::events::{BroadcastEventBridge, EventEmitter, LoggingEventEmitter};
use crate::mpris::{serve, DesktopTransport, PlayerMethods, ZbusTransport};
use crate::protocol_constants::MPRIS_IDENTITY;
use crate::receiver::discovery::{create_daemon, MdnsDiscovery, StaticDiscovery};
use crate::receiver::{CastConnector, DeviceAddress, ReceiverConnector, ReceiverDiscovery};
use crate::services::{BridgeAdapter, ConnectionHandle, ConnectionStateMachine};

/// Container for all bootstrapped services.
pub struct BootstrappedServices {
    /// Control surface of the connection state machine.
    pub connection: ConnectionHandle,
    /// The exported MPRIS player.
    pub adapter: Arc<BridgeAdapter>,
    /// Event bridge for subscribing to connection events.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    machine_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
    mdns: Option<Arc<ServiceDaemon>>,
    dbus: zbus::Connection,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services.
    ///
    /// The state machine passes through `Idle`, releasing the joined session
    /// and the receiver connection, and the bus name is given back.
    pub async fn shutdown(self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();

        if let Err(e) = self.machine_task.await {
            log::warn!("[Bootstrap] Connection task ended abnormally: {}", e);
        }
        if let Err(e) = self.event_task.await {
            log::warn!("[Bootstrap] Event task ended abnormally: {}", e);
        }

        // The event loop may stop before it sees the final `Disconnected`.
        self.adapter.leave_session().await;

        if let Some(daemon) = self.mdns {
            if let Err(e) = daemon.shutdown() {
                log::warn!("[Bootstrap] Failed to stop mDNS daemon: {}", e);
            }
        }
        drop(self.dbus);

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Services wired together but not yet exported or started.
struct Wiring {
    connection: ConnectionHandle,
    adapter: Arc<BridgeAdapter>,
    event_bridge: Arc<BroadcastEventBridge>,
    machine_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
}

/// Wires the state machine to the adapter and spawns both tasks.
///
/// The adapter subscribes before the machine starts, so no event is lost.
/// Nothing happens until [`ConnectionHandle::connect`] is called.
fn wire_services(
    config: &BridgeConfig,
    discovery: Arc<dyn ReceiverDiscovery>,
    connector: Arc<dyn ReceiverConnector>,
    transport: Arc<dyn DesktopTransport>,
    cancel_token: &CancellationToken,
) -> Wiring {
    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));
    event_bridge.set_external_emitter(Arc::new(LoggingEventEmitter));

    let (machine, connection) = ConnectionStateMachine::new(
        discovery,
        connector,
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
        config,
        cancel_token.clone(),
    );

    let adapter = Arc::new(BridgeAdapter::new(transport, connection.clone()));
    let event_task = adapter.spawn_event_loop(event_bridge.subscribe(), cancel_token.clone());
    let machine_task = tokio::spawn(machine.run());

    Wiring {
        connection,
        adapter,
        event_bridge,
        machine_task,
        event_task,
    }
}

/// Bootstraps all application services with their dependencies.
///
/// When `receiver` is given, mDNS discovery is skipped and that address is
/// used directly.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the mDNS daemon cannot
/// be started or the D-Bus session bus is unreachable.
pub async fn bootstrap_services(
    config: &BridgeConfig,
    receiver: Option<DeviceAddress>,
) -> BridgeResult<BootstrappedServices> {
    config.validate().map_err(BridgeError::Configuration)?;

    let (discovery, mdns): (Arc<dyn ReceiverDiscovery>, _) = match receiver {
        Some(address) => {
            log::info!("[Bootstrap] Using fixed receiver {}", address);
            (Arc::new(StaticDiscovery::new(address)), None)
        }
        None => {
            let daemon = Arc::new(create_daemon()?);
            (
                Arc::new(MdnsDiscovery::new(Arc::clone(&daemon))),
                Some(daemon),
            )
        }
    };

    let dbus = zbus::Connection::session()
        .await
        .map_err(|e| BridgeError::Transport(format!("Failed to open session bus: {}", e)))?;
    let transport = Arc::new(ZbusTransport::new(dbus.clone(), config.bus_name()));

    let cancel_token = CancellationToken::new();
    let wiring = wire_services(
        config,
        discovery,
        Arc::new(CastConnector::new()),
        transport,
        &cancel_token,
    );

    if let Err(e) = serve(
        &dbus,
        MPRIS_IDENTITY,
        Arc::clone(&wiring.adapter) as Arc<dyn PlayerMethods>,
    )
    .await
    {
        cancel_token.cancel();
        return Err(e.into());
    }

    wiring.connection.connect();
    log::info!("[Bootstrap] Bridge started as {}", config.bus_name());

    Ok(BootstrappedServices {
        connection: wiring.connection,
        adapter: wiring.adapter,
        event_bridge: wiring.event_bridge,
        cancel_token,
        machine_task: wiring.machine_task,
        event_task: wiring.event_task,
        mdns,
        dbus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::{ReceiverResult, TransportResult};
    use crate::mpris::{DesktopProperties, PropertyName};
    use crate::receiver::{ReceiverConnection, ReceiverError};
    use crate::services::ConnectionPhase;

    struct RefusingConnector;

    #[async_trait]
    impl ReceiverConnector for RefusingConnector {
        async fn connect(
            &self,
            _address: &DeviceAddress,
        ) -> ReceiverResult<Arc<dyn ReceiverConnection>> {
            Err(ReceiverError::Operation("connection refused".into()))
        }
    }

    #[derive(Default)]
    struct SilentTransport {
        requests: Mutex<u32>,
    }

    #[async_trait]
    impl DesktopTransport for SilentTransport {
        async fn request_name(&self) -> TransportResult<()> {
            *self.requests.lock() += 1;
            Ok(())
        }

        async fn release_name(&self) -> TransportResult<()> {
            Ok(())
        }

        async fn properties_changed(
            &self,
            _properties: &DesktopProperties,
            _changed: &[PropertyName],
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn seeked(&self, _position: i64) -> TransportResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wired_machine_starts_on_connect_and_stops_on_cancel() {
        let config = BridgeConfig::default();
        let cancel = CancellationToken::new();
        let transport = Arc::new(SilentTransport::default());
        let wiring = wire_services(
            &config,
            Arc::new(StaticDiscovery::new(DeviceAddress::new(Ipv4Addr::new(
                192, 168, 1, 20,
            )))),
            Arc::new(RefusingConnector),
            transport.clone(),
            &cancel,
        );

        assert_eq!(wiring.connection.phase(), ConnectionPhase::Idle);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(wiring.connection.phase(), ConnectionPhase::Idle);

        // The refused connection backs off in `Discovering`.
        wiring.connection.connect();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(wiring.connection.phase(), ConnectionPhase::Discovering);

        cancel.cancel();
        wiring.machine_task.await.unwrap();
        wiring.event_task.await.unwrap();

        assert_eq!(wiring.connection.phase(), ConnectionPhase::Idle);
        assert_eq!(*transport.requests.lock(), 0);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_io() {
        let config = BridgeConfig {
            player_name: "not a name".into(),
            ..Default::default()
        };
        let result = bootstrap_services(&config, None).await;
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }
}
