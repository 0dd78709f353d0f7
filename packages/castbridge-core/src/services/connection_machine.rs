//! Receiver connection lifecycle.
//!
//! [`ConnectionStateMachine`] drives discovery, connection, session lookup,
//! session join and status polling. Exactly one [`ConnectionPhase`] is active
//! at a time; every phase is an async step that either yields the next phase
//! or is interrupted by a command, an unsolicited channel close or shutdown.
//!
//! Each receiver request is bounded by the connect timeout, and a timeout is
//! handled exactly like an error reply. Leaving a step drops its pending
//! request and timer, so late replies from an earlier attempt can never reach
//! a newer phase.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::error::ReceiverResult;
use crate::events::{ConnectionEvent, EventEmitter};
use crate::receiver::{
    select_session, Capabilities, Channel, DeviceAddress, ReceiverConnection, ReceiverConnector,
    ReceiverDiscovery, ReceiverError, ReceiverPlayer, SessionDescriptor,
};
use crate::utils::micros_to_seconds;

/// Lifecycle phase of the receiver connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionPhase {
    Idle,
    Discovering,
    Connecting,
    FindingSession,
    JoiningSession,
    Polling,
}

/// Media command forwarded to the joined player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    /// Absolute position in microseconds.
    Seek(i64),
}

/// Command accepted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Player(PlayerCommand),
}

/// Cloneable control surface of a running [`ConnectionStateMachine`].
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    phase: watch::Receiver<ConnectionPhase>,
    joined: watch::Receiver<Option<Capabilities>>,
}

impl ConnectionHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::debug!("[Connection] Dropping {:?}: state machine stopped", command);
        }
    }

    /// Starts looking for a receiver and keeps reconnecting after failures.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Leaves any session, closes the connection and stays idle.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    pub fn play(&self) {
        self.send(Command::Player(PlayerCommand::Play));
    }

    pub fn pause(&self) {
        self.send(Command::Player(PlayerCommand::Pause));
    }

    pub fn stop(&self) {
        self.send(Command::Player(PlayerCommand::Stop));
    }

    /// Seeks to `position` microseconds.
    pub fn seek(&self, position: i64) {
        self.send(Command::Player(PlayerCommand::Seek(position)));
    }

    /// Current phase.
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase change.
    pub fn phase_changes(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.clone()
    }

    /// Capabilities of the joined player, `None` outside `Polling`.
    pub fn joined(&self) -> Option<Capabilities> {
        *self.joined.borrow()
    }

    /// Handle whose commands land in the returned receiver instead of a
    /// running machine. The returned sender drives [`Self::joined`].
    #[cfg(test)]
    pub(crate) fn detached() -> (
        Self,
        mpsc::UnboundedReceiver<Command>,
        watch::Sender<Option<Capabilities>>,
    ) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (_, phase) = watch::channel(ConnectionPhase::Polling);
        let (joined_tx, joined) = watch::channel(None);
        (
            Self {
                commands,
                phase,
                joined,
            },
            rx,
            joined_tx,
        )
    }
}

/// Where the run loop goes after a step ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Phase(ConnectionPhase),
    /// Enter the phase, but hold off its first request for the retry interval.
    Backoff(ConnectionPhase),
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
struct Timings {
    connect_timeout: Duration,
    poll_interval: Duration,
    retry_interval: Duration,
}

async fn closed(token: &Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// The receiver connection state machine.
pub struct ConnectionStateMachine {
    discovery: Arc<dyn ReceiverDiscovery>,
    connector: Arc<dyn ReceiverConnector>,
    emitter: Arc<dyn EventEmitter>,
    timings: Timings,
    commands: mpsc::UnboundedReceiver<Command>,
    phase_tx: watch::Sender<ConnectionPhase>,
    joined_tx: watch::Sender<Option<Capabilities>>,
    cancel: CancellationToken,

    phase: ConnectionPhase,
    address: Option<DeviceAddress>,
    client: Option<Arc<dyn ReceiverConnection>>,
    session: Option<SessionDescriptor>,
    player: Option<Arc<dyn ReceiverPlayer>>,
    /// Armed by `connect()`, cleared by `disconnect()`.
    reconnect: bool,
    /// Set when the current phase was entered through [`Next::Backoff`].
    backoff: bool,
}

impl ConnectionStateMachine {
    /// Creates an idle machine and the handle controlling it.
    ///
    /// Cancelling `cancel` makes [`Self::run`] release everything and return.
    pub fn new(
        discovery: Arc<dyn ReceiverDiscovery>,
        connector: Arc<dyn ReceiverConnector>,
        emitter: Arc<dyn EventEmitter>,
        config: &BridgeConfig,
        cancel: CancellationToken,
    ) -> (Self, ConnectionHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::Idle);
        let (joined_tx, joined_rx) = watch::channel(None);

        let machine = Self {
            discovery,
            connector,
            emitter,
            timings: Timings {
                connect_timeout: config.connect_timeout(),
                poll_interval: config.poll_interval(),
                retry_interval: config.retry_interval(),
            },
            commands,
            phase_tx,
            joined_tx,
            cancel,
            phase: ConnectionPhase::Idle,
            address: None,
            client: None,
            session: None,
            player: None,
            reconnect: false,
            backoff: false,
        };
        let handle = ConnectionHandle {
            commands: commands_tx,
            phase: phase_rx,
            joined: joined_rx,
        };
        (machine, handle)
    }

    /// Runs until cancelled, then passes through `Idle` to release the
    /// player and connection.
    pub async fn run(mut self) {
        log::debug!("[Connection] State machine started");
        loop {
            let next = match self.phase {
                ConnectionPhase::Idle => self.idle().await,
                ConnectionPhase::Discovering => self.discovering().await,
                ConnectionPhase::Connecting => self.connecting().await,
                ConnectionPhase::FindingSession => self.finding_session().await,
                ConnectionPhase::JoiningSession => self.joining_session().await,
                ConnectionPhase::Polling => self.polling().await,
            };
            match next {
                Next::Phase(phase) => {
                    self.backoff = false;
                    self.transition(phase);
                }
                Next::Backoff(phase) => {
                    self.backoff = true;
                    self.transition(phase);
                }
                Next::Shutdown => break,
            }
        }
        self.transition(ConnectionPhase::Idle);
        log::debug!("[Connection] State machine stopped");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs the exit action of the current phase, then the entry action of `to`.
    fn transition(&mut self, to: ConnectionPhase) {
        let from = self.phase;

        if from == ConnectionPhase::Polling {
            self.joined_tx.send_replace(None);
            self.release_player();
            self.emitter.emit_connection(ConnectionEvent::Disconnected);
        }

        match to {
            ConnectionPhase::Idle | ConnectionPhase::Discovering => {
                self.release_player();
                self.release_client();
                self.address = None;
                self.session = None;
            }
            ConnectionPhase::FindingSession => {
                self.release_player();
                self.session = None;
            }
            ConnectionPhase::Connecting | ConnectionPhase::JoiningSession => {}
            ConnectionPhase::Polling => {
                if let (Some(session), Some(player)) = (&self.session, &self.player) {
                    self.joined_tx.send_replace(Some(player.capabilities()));
                    self.emitter.emit_connection(ConnectionEvent::Connected {
                        session: session.clone(),
                        capabilities: player.capabilities(),
                    });
                }
            }
        }

        self.phase = to;
        self.phase_tx.send_replace(to);
        if from != to {
            log::debug!("[Connection] {:?} -> {:?}", from, to);
            self.emitter
                .emit_connection(ConnectionEvent::PhaseChanged { from, to });
        }
    }

    fn release_player(&mut self) {
        if let Some(player) = self.player.take() {
            player.close();
        }
    }

    fn release_client(&mut self) {
        if let Some(client) = self.client.take() {
            client.close();
        }
    }

    fn channel_closed(&self, channel: Channel) -> Next {
        log::warn!("[Connection] Receiver {} closed unexpectedly", channel);
        match channel {
            Channel::Connection => Next::Backoff(ConnectionPhase::Discovering),
            Channel::Session => Next::Phase(ConnectionPhase::FindingSession),
        }
    }

    fn handle_command(&mut self, command: Command) -> Option<Next> {
        log::debug!("[Connection] {:?} in {:?}", command, self.phase);
        match command {
            Command::Connect => {
                self.reconnect = true;
                if self.phase == ConnectionPhase::Idle {
                    Some(Next::Phase(ConnectionPhase::Discovering))
                } else {
                    None
                }
            }
            Command::Disconnect => {
                self.reconnect = false;
                Some(Next::Phase(ConnectionPhase::Idle))
            }
            Command::Player(command) => {
                self.dispatch(command);
                None
            }
        }
    }

    /// Sends a media command to the joined player without blocking the phase.
    fn dispatch(&self, command: PlayerCommand) {
        let Some(player) = self.player.clone() else {
            log::debug!("[Connection] Ignoring {:?}: no session joined", command);
            return;
        };
        let timeout = self.timings.connect_timeout;

        tokio::spawn(async move {
            let request = async {
                match command {
                    PlayerCommand::Play => player.play().await,
                    PlayerCommand::Pause => player.pause().await,
                    PlayerCommand::Stop => player.stop().await,
                    PlayerCommand::Seek(position) => player.seek(micros_to_seconds(position)).await,
                }
            };
            match tokio::time::timeout(timeout, request).await {
                Ok(Ok(())) => log::debug!("[Connection] {:?} sent", command),
                Ok(Err(e)) => log::warn!("[Connection] {:?} failed: {}", command, e),
                Err(_) => log::warn!("[Connection] {:?} timed out after {:?}", command, timeout),
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Suspension points
    // ─────────────────────────────────────────────────────────────────────────

    /// Awaits `fut` while serving commands and watching the held channels.
    ///
    /// Returns `Err` with the phase to move to when something other than
    /// `fut` ends the step.
    async fn race<F: Future>(&mut self, fut: F) -> Result<F::Output, Next> {
        let connection_closed = self.client.as_ref().map(|c| c.closed());
        let session_closed = self.player.as_ref().map(|p| p.closed());
        tokio::pin!(fut);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(Next::Shutdown),
                _ = closed(&connection_closed) => {
                    return Err(self.channel_closed(Channel::Connection));
                }
                _ = closed(&session_closed) => {
                    return Err(self.channel_closed(Channel::Session));
                }
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some(next) = self.handle_command(command) {
                            return Err(next);
                        }
                    }
                    None => {
                        log::debug!("[Connection] All handles dropped");
                        return Err(Next::Shutdown);
                    }
                },
                output = &mut fut => return Ok(output),
            }
        }
    }

    /// A receiver request bounded by the connect timeout.
    async fn request<T, F>(&mut self, fut: F) -> Result<ReceiverResult<T>, Next>
    where
        F: Future<Output = ReceiverResult<T>>,
    {
        let timeout = self.timings.connect_timeout;
        let outcome = self.race(tokio::time::timeout(timeout, fut)).await?;
        Ok(outcome.unwrap_or(Err(ReceiverError::Timeout(timeout))))
    }

    /// Sleeps for `duration` unless the step is interrupted first.
    async fn wait(&mut self, duration: Duration) -> Result<(), Next> {
        self.race(tokio::time::sleep(duration)).await
    }

    /// Waits out the retry interval if the phase was entered after a failure.
    async fn back_off(&mut self) -> Result<(), Next> {
        if !std::mem::take(&mut self.backoff) {
            return Ok(());
        }
        log::debug!(
            "[Connection] Retrying {:?} in {:?}",
            self.phase,
            self.timings.retry_interval
        );
        self.wait(self.timings.retry_interval).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Phases
    // ─────────────────────────────────────────────────────────────────────────

    async fn idle(&mut self) -> Next {
        if self.reconnect {
            log::debug!(
                "[Connection] Reconnecting in {:?}",
                self.timings.retry_interval
            );
            return match self.wait(self.timings.retry_interval).await {
                Ok(()) => Next::Phase(ConnectionPhase::Discovering),
                Err(next) => next,
            };
        }
        match self.race(std::future::pending::<Next>()).await {
            Ok(next) | Err(next) => next,
        }
    }

    async fn discovering(&mut self) -> Next {
        if let Err(next) = self.back_off().await {
            return next;
        }
        log::info!("[Connection] Looking for a receiver");
        let discovery = self.discovery.clone();
        loop {
            match self.race(discovery.find_first()).await {
                Err(next) => return next,
                Ok(Ok(address)) => {
                    log::info!("[Connection] Found receiver {}", address);
                    self.address = Some(address);
                    return Next::Phase(ConnectionPhase::Connecting);
                }
                Ok(Err(e)) => {
                    log::warn!(
                        "[Connection] Discovery failed, retrying in {:?}: {}",
                        self.timings.retry_interval,
                        e
                    );
                    if let Err(next) = self.wait(self.timings.retry_interval).await {
                        return next;
                    }
                }
            }
        }
    }

    async fn connecting(&mut self) -> Next {
        let Some(address) = self.address.clone() else {
            return Next::Phase(ConnectionPhase::Discovering);
        };
        let connector = self.connector.clone();

        match self.request(connector.connect(&address)).await {
            Err(next) => next,
            Ok(Ok(client)) => {
                log::debug!("[Connection] Connected to {}", address);
                self.client = Some(client);
                Next::Phase(ConnectionPhase::FindingSession)
            }
            Ok(Err(e)) => {
                log::warn!("[Connection] Connecting to {} failed: {}", address, e);
                Next::Backoff(ConnectionPhase::Discovering)
            }
        }
    }

    async fn finding_session(&mut self) -> Next {
        let Some(client) = self.client.clone() else {
            return Next::Phase(ConnectionPhase::Discovering);
        };
        if let Err(next) = self.back_off().await {
            return next;
        }

        loop {
            match self.request(client.list_sessions()).await {
                Err(next) => return next,
                Ok(Ok(sessions)) => match select_session(&sessions) {
                    Some(session) => {
                        log::info!(
                            "[Connection] Found session {} ({})",
                            session.display_name,
                            session.app_id
                        );
                        self.session = Some(session.clone());
                        return Next::Phase(ConnectionPhase::JoiningSession);
                    }
                    None => {
                        log::debug!(
                            "[Connection] No eligible session among {}, retrying in {:?}",
                            sessions.len(),
                            self.timings.retry_interval
                        );
                        if let Err(next) = self.wait(self.timings.retry_interval).await {
                            return next;
                        }
                    }
                },
                // No session is held yet, so only the connection can close.
                Ok(Err(e)) if e.is_unsolicited_close() => {
                    return self.channel_closed(Channel::Connection);
                }
                Ok(Err(e)) => {
                    log::warn!("[Connection] Listing sessions failed: {}", e);
                    return Next::Phase(ConnectionPhase::Idle);
                }
            }
        }
    }

    async fn joining_session(&mut self) -> Next {
        let (Some(client), Some(session)) = (self.client.clone(), self.session.clone()) else {
            return Next::Phase(ConnectionPhase::FindingSession);
        };

        match self.request(client.join(&session)).await {
            Err(next) => next,
            Ok(Ok(player)) => {
                log::info!(
                    "[Connection] Joined session {} ({})",
                    session.display_name,
                    session.session_id
                );
                self.player = Some(player);
                Next::Phase(ConnectionPhase::Polling)
            }
            Ok(Err(e)) if e.is_unsolicited_close() => self.channel_closed(Channel::Connection),
            Ok(Err(e)) => {
                log::warn!("[Connection] Joining session failed: {}", e);
                Next::Backoff(ConnectionPhase::FindingSession)
            }
        }
    }

    async fn polling(&mut self) -> Next {
        let Some(player) = self.player.clone() else {
            return Next::Phase(ConnectionPhase::FindingSession);
        };

        loop {
            match self.request(player.get_status()).await {
                Err(next) => return next,
                Ok(Ok(snapshot)) => {
                    self.emitter
                        .emit_connection(ConnectionEvent::Status(snapshot));
                    if let Err(next) = self.wait(self.timings.poll_interval).await {
                        return next;
                    }
                }
                Ok(Err(ReceiverError::UnsolicitedClose(channel))) => {
                    return self.channel_closed(channel);
                }
                Ok(Err(e)) => {
                    log::warn!("[Connection] Status request failed: {}", e);
                    return Next::Phase(ConnectionPhase::Idle);
                }
            }
        }
    }
}
