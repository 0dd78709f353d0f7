//! MPRIS bridge adapter.
//!
//! Sits between the connection state machine and the desktop bus:
//! - consumes [`ConnectionEvent`]s, runs status snapshots through the
//!   translator and pushes property changes and `Seeked` to the transport
//! - receives player method calls and forwards them to the state machine,
//!   dropping calls the joined player has no capability for
//! - claims the bus name while a session is joined

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{BroadcastEvent, ConnectionEvent};
use crate::mpris::{translate, DesktopProperties, DesktopTransport, PlayerMethods};
use crate::protocol_constants::{MPRIS_OBJECT_PATH, MPRIS_PLAYER_INTERFACE};
use crate::receiver::{Capabilities, StatusSnapshot};
use crate::services::connection_machine::ConnectionHandle;
use crate::utils::now_millis;

/// Per-session bookkeeping, reset on every join.
#[derive(Debug, Default)]
struct SyncState {
    joined: bool,
    capabilities: Capabilities,
    /// Wall-clock time (ms) at which playback was at position zero.
    baseline_ms: i64,
}

/// Bridges the connection state machine to the MPRIS player.
pub struct BridgeAdapter {
    properties: RwLock<DesktopProperties>,
    sync: Mutex<SyncState>,
    transport: Arc<dyn DesktopTransport>,
    connection: ConnectionHandle,
    clock: fn() -> i64,
}

impl BridgeAdapter {
    pub fn new(transport: Arc<dyn DesktopTransport>, connection: ConnectionHandle) -> Self {
        Self {
            properties: RwLock::new(DesktopProperties::idle()),
            sync: Mutex::new(SyncState::default()),
            transport,
            connection,
            clock: now_millis,
        }
    }

    /// Capabilities of the joined player (empty when none is joined).
    pub fn capabilities(&self) -> Capabilities {
        self.sync.lock().capabilities
    }

    /// Spawns the task feeding connection events into [`Self::handle_event`].
    ///
    /// Runs until `cancel` fires or the event channel closes.
    pub fn spawn_event_loop(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<BroadcastEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(BroadcastEvent::Connection(event)) => adapter.handle_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            log::warn!("[Bridge] Event loop lagged, skipped {} events", skipped);
                            adapter.resync().await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            log::debug!("[Bridge] Event loop stopped");
        })
    }

    /// Applies one connection event.
    pub async fn handle_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected {
                session,
                capabilities,
            } => {
                log::info!(
                    "[Bridge] Session {} joined, capabilities {:#06b}",
                    session.display_name,
                    capabilities.bits()
                );
                *self.sync.lock() = SyncState {
                    joined: true,
                    capabilities,
                    baseline_ms: 0,
                };
                if let Err(e) = self.transport.request_name().await {
                    log::warn!("[Bridge] Failed to acquire bus name: {}", e);
                }
            }
            ConnectionEvent::Disconnected => self.leave_session().await,
            ConnectionEvent::Status(snapshot) => self.apply_status(&snapshot).await,
            ConnectionEvent::PhaseChanged { .. } => {}
        }
    }

    /// Realigns the joined state with the state machine after missed events.
    ///
    /// Events still queued after the gap are applied on top of this, so a
    /// skipped `Connected` or `Disconnected` cannot leave the bus name held
    /// or commands gated off.
    pub async fn resync(&self) {
        let Some(capabilities) = self.connection.joined() else {
            self.leave_session().await;
            return;
        };

        let newly_joined = {
            let mut sync = self.sync.lock();
            let newly_joined = !sync.joined;
            if newly_joined {
                *sync = SyncState {
                    joined: true,
                    capabilities,
                    baseline_ms: 0,
                };
            } else {
                sync.capabilities = capabilities;
            }
            newly_joined
        };

        if newly_joined {
            log::info!("[Bridge] Resynced to joined session");
            if let Err(e) = self.transport.request_name().await {
                log::warn!("[Bridge] Failed to acquire bus name: {}", e);
            }
        }
    }

    /// Resets the exported state to idle and gives the bus name back.
    ///
    /// Does nothing when no session is joined.
    pub async fn leave_session(&self) {
        {
            let mut sync = self.sync.lock();
            if !sync.joined {
                return;
            }
            *sync = SyncState::default();
        }

        let idle = DesktopProperties::idle();
        let previous = std::mem::replace(&mut *self.properties.write(), idle.clone());
        let changed = previous.diff(&idle);
        if !changed.is_empty() {
            if let Err(e) = self.transport.properties_changed(&idle, &changed).await {
                log::warn!("[Bridge] Failed to publish idle properties: {}", e);
            }
        }
        if let Err(e) = self.transport.release_name().await {
            log::warn!("[Bridge] Failed to release bus name: {}", e);
        }
    }

    async fn apply_status(&self, snapshot: &StatusSnapshot) {
        let now = (self.clock)();
        let baseline = self.sync.lock().baseline_ms;

        let translation = {
            let mut properties = self.properties.write();
            let translation = translate(&properties, snapshot, now, baseline);
            *properties = translation.next.clone();
            translation
        };

        if let Some(seeked) = translation.seeked {
            self.sync.lock().baseline_ms = seeked.baseline_ms;
        }

        if !translation.changed.is_empty() {
            if let Err(e) = self
                .transport
                .properties_changed(&translation.next, &translation.changed)
                .await
            {
                log::warn!("[Bridge] Failed to publish property changes: {}", e);
            }
        }

        if let Some(seeked) = translation.seeked {
            if let Err(e) = self.transport.seeked(seeked.position).await {
                log::warn!("[Bridge] Failed to emit Seeked: {}", e);
            }
        }
    }

    fn log_call(&self, method: &str, parameters: &str) {
        log::info!(
            "[MPRIS] received dbus call: path=`{}` interface=`{}` method=`{}` parameters=[{}]",
            MPRIS_OBJECT_PATH,
            MPRIS_PLAYER_INTERFACE,
            method,
            parameters
        );
    }

    /// Returns true if the joined player supports `capability`; warns otherwise.
    fn supports(&self, capability: Capabilities, name: &str) -> bool {
        if self.capabilities().contains(capability) {
            true
        } else {
            log::warn!("[MPRIS] `{}` is not supported by player", name);
            false
        }
    }
}

impl PlayerMethods for BridgeAdapter {
    fn properties(&self) -> DesktopProperties {
        self.properties.read().clone()
    }

    fn next(&self) {
        self.log_call("Next", "");
        if self.supports(Capabilities::NEXT, "next") {
            log::debug!("[MPRIS] `next` has no receiver command");
        }
    }

    fn previous(&self) {
        self.log_call("Previous", "");
        if self.supports(Capabilities::PREVIOUS, "previous") {
            log::debug!("[MPRIS] `previous` has no receiver command");
        }
    }

    fn pause(&self) {
        self.log_call("Pause", "");
        if self.supports(Capabilities::PAUSE, "pause") {
            self.connection.pause();
        }
    }

    fn play_pause(&self) {
        self.log_call("PlayPause", "");
        if !self.supports(Capabilities::PLAY, "play") || !self.supports(Capabilities::PAUSE, "pause")
        {
            return;
        }
        if self.properties.read().can_play {
            self.connection.play();
        } else {
            self.connection.pause();
        }
    }

    fn stop(&self) {
        self.log_call("Stop", "");
        if self.supports(Capabilities::STOP, "stop") {
            self.connection.stop();
        }
    }

    fn play(&self) {
        self.log_call("Play", "");
        if self.supports(Capabilities::PLAY, "play") {
            self.connection.play();
        }
    }

    fn seek(&self, offset: i64) {
        self.log_call("Seek", &offset.to_string());
        if !self.supports(Capabilities::SEEK, "seek") {
            return;
        }

        let target = {
            let properties = self.properties.read();
            let target = properties.position.saturating_add(offset).max(0);
            match properties.metadata.length {
                Some(length) if length > 0 => target.min(length),
                _ => target,
            }
        };
        self.connection.seek(target);
    }

    fn set_position(&self, track_id: &str, position: i64) {
        self.log_call("SetPosition", &format!("{}, {}", track_id, position));
        if !self.supports(Capabilities::SEEK, "seek") {
            return;
        }

        {
            let properties = self.properties.read();
            if properties.metadata.track_id.as_deref() != Some(track_id) {
                log::debug!("[MPRIS] Ignoring SetPosition for stale track {}", track_id);
                return;
            }
            let beyond_end = matches!(properties.metadata.length, Some(length) if position > length);
            if position < 0 || beyond_end {
                log::debug!("[MPRIS] Ignoring SetPosition outside the track: {}", position);
                return;
            }
        }
        self.connection.seek(position);
    }

    fn open_uri(&self, uri: &str) {
        self.log_call("OpenUri", uri);
        if self.supports(Capabilities::OPEN, "open") {
            log::debug!("[MPRIS] `open` has no receiver command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::{mpsc, watch};

    use crate::events::{BroadcastEventBridge, EventEmitter};
    use crate::mpris::{PlaybackStatus, PropertyName, TransportResult};
    use crate::protocol_constants::MPRIS_TRACK_ID;
    use crate::receiver::{MediaInfo, PlayerState, SessionDescriptor};
    use crate::services::connection_machine::{Command, PlayerCommand};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        RequestName,
        ReleaseName,
        PropertiesChanged(Vec<PropertyName>),
        Seeked(i64),
    }

    #[derive(Default)]
    struct MockTransport {
        calls: Mutex<Vec<Call>>,
    }

    impl MockTransport {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl DesktopTransport for MockTransport {
        async fn request_name(&self) -> TransportResult<()> {
            self.calls.lock().push(Call::RequestName);
            Ok(())
        }

        async fn release_name(&self) -> TransportResult<()> {
            self.calls.lock().push(Call::ReleaseName);
            Ok(())
        }

        async fn properties_changed(
            &self,
            _properties: &DesktopProperties,
            changed: &[PropertyName],
        ) -> TransportResult<()> {
            self.calls
                .lock()
                .push(Call::PropertiesChanged(changed.to_vec()));
            Ok(())
        }

        async fn seeked(&self, position: i64) -> TransportResult<()> {
            self.calls.lock().push(Call::Seeked(position));
            Ok(())
        }
    }

    fn fixed_clock() -> i64 {
        10_000
    }

    fn adapter() -> (
        Arc<BridgeAdapter>,
        Arc<MockTransport>,
        mpsc::UnboundedReceiver<Command>,
    ) {
        let (adapter, transport, commands, _joined) = adapter_with_joined();
        (adapter, transport, commands)
    }

    /// Like [`adapter`], also returning the sender behind `ConnectionHandle::joined`.
    fn adapter_with_joined() -> (
        Arc<BridgeAdapter>,
        Arc<MockTransport>,
        mpsc::UnboundedReceiver<Command>,
        watch::Sender<Option<Capabilities>>,
    ) {
        let transport = Arc::new(MockTransport::default());
        let (handle, commands, joined) = ConnectionHandle::detached();
        let mut adapter = BridgeAdapter::new(transport.clone(), handle);
        adapter.clock = fixed_clock;
        (Arc::new(adapter), transport, commands, joined)
    }

    fn connected() -> ConnectionEvent {
        ConnectionEvent::Connected {
            session: SessionDescriptor {
                app_id: "CC1AD845".into(),
                display_name: "Default Media Receiver".into(),
                session_id: "s-1".into(),
                transport_id: "t-1".into(),
                namespaces: vec![],
            },
            capabilities: Capabilities::MEDIA,
        }
    }

    fn status(state: PlayerState, seconds: f64) -> ConnectionEvent {
        ConnectionEvent::Status(StatusSnapshot {
            player_state: Some(state),
            current_time_seconds: Some(seconds),
            media: Some(MediaInfo {
                duration_seconds: Some(100.0),
            }),
            volume: None,
            playback_rate: Some(1.0),
        })
    }

    fn drain(commands: &mut mpsc::UnboundedReceiver<Command>) -> Vec<Command> {
        let mut out = Vec::new();
        while let Ok(command) = commands.try_recv() {
            out.push(command);
        }
        out
    }

    #[tokio::test]
    async fn connected_requests_bus_name_and_stores_capabilities() {
        let (adapter, transport, _commands) = adapter();
        adapter.handle_event(connected()).await;
        assert_eq!(transport.calls(), vec![Call::RequestName]);
        assert_eq!(adapter.capabilities(), Capabilities::MEDIA);
    }

    #[tokio::test]
    async fn status_publishes_only_changed_properties() {
        let (adapter, transport, _commands) = adapter();
        adapter.handle_event(connected()).await;
        adapter.handle_event(status(PlayerState::Paused, 10.0)).await;
        adapter.handle_event(status(PlayerState::Paused, 10.0)).await;

        assert_eq!(
            transport.calls(),
            vec![
                Call::RequestName,
                Call::PropertiesChanged(vec![
                    PropertyName::PlaybackStatus,
                    PropertyName::Metadata,
                    PropertyName::CanPause,
                    PropertyName::CanSeek,
                ]),
            ]
        );
        let props = adapter.properties();
        assert_eq!(props.playback_status, PlaybackStatus::Paused);
        assert_eq!(props.position, 10_000_000);
    }

    #[tokio::test]
    async fn drift_emits_seeked_once_then_tracks_baseline() {
        let (adapter, transport, _commands) = adapter();
        adapter.handle_event(connected()).await;
        // Baseline starts at zero, clock at 10s, position 4s: 6s of drift.
        adapter.handle_event(status(PlayerState::Playing, 4.0)).await;
        adapter.handle_event(status(PlayerState::Playing, 4.0)).await;

        let seeks: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Seeked(_)))
            .collect();
        assert_eq!(seeks, vec![Call::Seeked(4_000_000)]);
    }

    #[tokio::test]
    async fn disconnected_resets_to_idle_and_releases_name() {
        let (adapter, transport, _commands) = adapter();
        adapter.handle_event(connected()).await;
        adapter.handle_event(status(PlayerState::Paused, 1.0)).await;
        adapter.handle_event(ConnectionEvent::Disconnected).await;

        let props = adapter.properties();
        assert_eq!(props.playback_status, PlaybackStatus::Idle);
        assert!(props.metadata.is_empty());
        assert_eq!(adapter.capabilities(), Capabilities::NONE);

        let calls = transport.calls();
        assert_eq!(calls.last(), Some(&Call::ReleaseName));
        assert!(matches!(
            &calls[calls.len() - 2],
            Call::PropertiesChanged(changed) if changed.contains(&PropertyName::PlaybackStatus)
        ));
    }

    #[tokio::test]
    async fn leave_session_without_join_does_nothing() {
        let (adapter, transport, _commands) = adapter();
        adapter.leave_session().await;
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn play_pause_follows_can_play() {
        let (adapter, _transport, mut commands) = adapter();
        adapter.handle_event(connected()).await;

        adapter.handle_event(status(PlayerState::Playing, 0.0)).await;
        adapter.play_pause();
        adapter.handle_event(status(PlayerState::Paused, 0.0)).await;
        adapter.play_pause();

        assert_eq!(
            drain(&mut commands),
            vec![
                Command::Player(PlayerCommand::Play),
                Command::Player(PlayerCommand::Pause),
            ]
        );
    }

    #[tokio::test]
    async fn commands_without_capability_are_dropped() {
        let (adapter, _transport, mut commands) = adapter();
        adapter.play();
        adapter.pause();
        adapter.stop();
        adapter.seek(1_000_000);
        adapter.play_pause();
        assert!(drain(&mut commands).is_empty());

        adapter.handle_event(connected()).await;
        adapter.next();
        adapter.previous();
        adapter.open_uri("https://example.com/a.mp3");
        assert!(drain(&mut commands).is_empty());
    }

    #[tokio::test]
    async fn supported_commands_are_forwarded() {
        let (adapter, _transport, mut commands) = adapter();
        adapter.handle_event(connected()).await;
        adapter.play();
        adapter.pause();
        adapter.stop();
        assert_eq!(
            drain(&mut commands),
            vec![
                Command::Player(PlayerCommand::Play),
                Command::Player(PlayerCommand::Pause),
                Command::Player(PlayerCommand::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn seek_is_relative_and_clamped() {
        let (adapter, _transport, mut commands) = adapter();
        adapter.handle_event(connected()).await;
        adapter.handle_event(status(PlayerState::Paused, 10.0)).await;

        adapter.seek(5_000_000);
        adapter.seek(-60_000_000);
        adapter.seek(500_000_000);

        assert_eq!(
            drain(&mut commands),
            vec![
                Command::Player(PlayerCommand::Seek(15_000_000)),
                Command::Player(PlayerCommand::Seek(0)),
                Command::Player(PlayerCommand::Seek(100_000_000)),
            ]
        );
    }

    #[tokio::test]
    async fn set_position_checks_track_and_range() {
        let (adapter, _transport, mut commands) = adapter();
        adapter.handle_event(connected()).await;
        adapter.handle_event(status(PlayerState::Paused, 10.0)).await;

        adapter.set_position("/org/example/other", 1_000_000);
        adapter.set_position(MPRIS_TRACK_ID, -1);
        adapter.set_position(MPRIS_TRACK_ID, 200_000_000);
        adapter.set_position(MPRIS_TRACK_ID, 30_000_000);

        assert_eq!(
            drain(&mut commands),
            vec![Command::Player(PlayerCommand::Seek(30_000_000))]
        );
    }

    #[tokio::test]
    async fn event_loop_applies_broadcast_events() {
        let (adapter, transport, _commands) = adapter();
        let bridge = BroadcastEventBridge::new(16);
        let cancel = CancellationToken::new();
        let task = adapter.spawn_event_loop(bridge.subscribe(), cancel.clone());

        bridge.emit_connection(connected());
        bridge.emit_connection(ConnectionEvent::Disconnected);
        drop(bridge);
        task.await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.first(), Some(&Call::RequestName));
        assert_eq!(calls.last(), Some(&Call::ReleaseName));
    }

    #[tokio::test]
    async fn resync_leaves_session_the_machine_already_left() {
        let (adapter, transport, _commands, _joined) = adapter_with_joined();
        adapter.handle_event(connected()).await;
        adapter.handle_event(status(PlayerState::Playing, 1.0)).await;

        adapter.resync().await;

        assert_eq!(adapter.properties().playback_status, PlaybackStatus::Idle);
        assert_eq!(adapter.capabilities(), Capabilities::NONE);
        assert_eq!(transport.calls().last(), Some(&Call::ReleaseName));
    }

    #[tokio::test]
    async fn resync_adopts_session_joined_while_lagging() {
        let (adapter, transport, mut commands, joined) = adapter_with_joined();
        joined.send_replace(Some(Capabilities::MEDIA));

        adapter.resync().await;
        adapter.resync().await;
        adapter.play();

        assert_eq!(adapter.capabilities(), Capabilities::MEDIA);
        assert_eq!(transport.calls(), vec![Call::RequestName]);
        assert_eq!(
            drain(&mut commands),
            vec![Command::Player(PlayerCommand::Play)]
        );
    }

    #[tokio::test]
    async fn lagged_event_loop_recovers_missed_disconnect() {
        let (adapter, transport, _commands, _joined) = adapter_with_joined();
        adapter.handle_event(connected()).await;

        // Capacity one: `Disconnected` is overwritten before the loop reads it.
        let bridge = BroadcastEventBridge::new(1);
        let events = bridge.subscribe();
        bridge.emit_connection(ConnectionEvent::Disconnected);
        bridge.emit_connection(ConnectionEvent::PhaseChanged {
            from: crate::services::ConnectionPhase::Polling,
            to: crate::services::ConnectionPhase::FindingSession,
        });
        let task = adapter.spawn_event_loop(events, CancellationToken::new());
        drop(bridge);
        task.await.unwrap();

        assert_eq!(adapter.properties().playback_status, PlaybackStatus::Idle);
        assert_eq!(transport.calls().last(), Some(&Call::ReleaseName));
    }

    #[tokio::test]
    async fn lagged_event_loop_recovers_missed_connect() {
        let (adapter, transport, mut commands, joined) = adapter_with_joined();
        joined.send_replace(Some(Capabilities::MEDIA));

        let bridge = BroadcastEventBridge::new(1);
        let events = bridge.subscribe();
        bridge.emit_connection(connected());
        bridge.emit_connection(status(PlayerState::Paused, 2.0));
        let task = adapter.spawn_event_loop(events, CancellationToken::new());
        drop(bridge);
        task.await.unwrap();

        assert_eq!(transport.calls().first(), Some(&Call::RequestName));
        assert_eq!(adapter.properties().playback_status, PlaybackStatus::Paused);
        adapter.pause();
        assert_eq!(
            drain(&mut commands),
            vec![Command::Player(PlayerCommand::Pause)]
        );
    }
}
