//! Cast v2 wire client built on `rust_cast`.
//!
//! `rust_cast` is blocking and its `CastDevice` is not `Sync`, so every
//! connection gets a dedicated worker thread that owns the device. Async
//! callers talk to it through a crossbeam request channel and get their
//! answers back on a tokio oneshot.
//!
//! The worker pings the heartbeat channel whenever no request arrived for
//! [`CAST_HEARTBEAT_INTERVAL_SECS`]. A failed ping means the device went
//! away: the connection's close token is cancelled and the worker exits.

use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rust_cast::channels::media::{PlayerState as CastPlayerState, ResumeState, Status};
use rust_cast::CastDevice;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::ReceiverResult;
use crate::protocol_constants::{
    CAST_HEARTBEAT_INTERVAL_SECS, CAST_MEDIA_NAMESPACE, CAST_RECEIVER_DESTINATION,
};
use crate::receiver::traits::{ReceiverConnection, ReceiverConnector, ReceiverPlayer};
use crate::receiver::types::{
    Capabilities, Channel, DeviceAddress, MediaInfo, PlayerState, ReceiverError,
    SessionDescriptor, StatusSnapshot, VolumeInfo,
};

/// Ensures the Rustls CryptoProvider is initialized exactly once.
fn ensure_crypto_provider_initialized() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::aws_lc_rs::default_provider(),
        );
    });
}

fn operation(err: impl std::fmt::Display) -> ReceiverError {
    ReceiverError::Operation(err.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker protocol
// ─────────────────────────────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<ReceiverResult<T>>;

#[derive(Debug, Clone, Copy)]
enum MediaCommand {
    Play,
    Pause,
    Stop,
    Seek(f32),
}

/// Media status of a session together with the media session id it reported.
struct SessionStatus {
    snapshot: StatusSnapshot,
    media_session_id: Option<i32>,
}

enum Request {
    ListSessions(Reply<Vec<SessionDescriptor>>),
    Join {
        transport_id: String,
        reply: Reply<()>,
    },
    Leave {
        transport_id: String,
    },
    Status {
        session_id: String,
        transport_id: String,
        reply: Reply<SessionStatus>,
    },
    Media {
        transport_id: String,
        media_session_id: i32,
        command: MediaCommand,
        reply: Reply<()>,
    },
    Close,
}

/// Sends a request to the worker and waits for its answer.
///
/// A worker that is gone reports an unsolicited connection close.
async fn call<T>(
    requests: &Sender<Request>,
    make: impl FnOnce(Reply<T>) -> Request,
) -> ReceiverResult<T> {
    let (tx, rx) = oneshot::channel();
    requests
        .send(make(tx))
        .map_err(|_| ReceiverError::UnsolicitedClose(Channel::Connection))?;
    rx.await
        .map_err(|_| ReceiverError::UnsolicitedClose(Channel::Connection))?
}

fn open_device(host: String, port: u16) -> ReceiverResult<CastDevice<'static>> {
    ensure_crypto_provider_initialized();

    let device = CastDevice::connect_without_host_verification(host, port).map_err(operation)?;
    device
        .connection
        .connect(CAST_RECEIVER_DESTINATION)
        .map_err(operation)?;
    Ok(device)
}

fn run_worker(
    device: CastDevice<'static>,
    requests: crossbeam_channel::Receiver<Request>,
    closed: CancellationToken,
) {
    let heartbeat = Duration::from_secs(CAST_HEARTBEAT_INTERVAL_SECS);
    let mut last_ping = Instant::now();

    loop {
        let until_ping = heartbeat.saturating_sub(last_ping.elapsed());
        match requests.recv_timeout(until_ping) {
            Ok(Request::Close) => break,
            Ok(request) => handle_request(&device, request),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_ping.elapsed() >= heartbeat {
            if let Err(e) = device.heartbeat.ping() {
                log::warn!("[Cast] Heartbeat failed, connection lost: {}", e);
                closed.cancel();
                return;
            }
            last_ping = Instant::now();
        }
    }

    if let Err(e) = device.connection.disconnect(CAST_RECEIVER_DESTINATION) {
        log::debug!("[Cast] Disconnect from receiver failed: {}", e);
    }
    log::debug!("[Cast] Worker stopped");
}

fn handle_request(device: &CastDevice<'static>, request: Request) {
    match request {
        Request::ListSessions(reply) => {
            let _ = reply.send(list_sessions(device));
        }
        Request::Join {
            transport_id,
            reply,
        } => {
            let _ = reply.send(device.connection.connect(transport_id).map_err(operation));
        }
        Request::Leave { transport_id } => {
            if let Err(e) = device.connection.disconnect(transport_id) {
                log::debug!("[Cast] Leaving session failed: {}", e);
            }
        }
        Request::Status {
            session_id,
            transport_id,
            reply,
        } => {
            let _ = reply.send(session_status(device, &session_id, transport_id));
        }
        Request::Media {
            transport_id,
            media_session_id,
            command,
            reply,
        } => {
            let media = &device.media;
            let result = match command {
                MediaCommand::Play => media.play(transport_id, media_session_id).map(|_| ()),
                MediaCommand::Pause => media.pause(transport_id, media_session_id).map(|_| ()),
                MediaCommand::Stop => media.stop(transport_id, media_session_id).map(|_| ()),
                MediaCommand::Seek(position) => media
                    .seek(
                        transport_id,
                        media_session_id,
                        Some(position),
                        Some(ResumeState::PlaybackStart),
                    )
                    .map(|_| ()),
            };
            let _ = reply.send(result.map_err(operation));
        }
        Request::Close => {}
    }
}

fn list_sessions(device: &CastDevice<'static>) -> ReceiverResult<Vec<SessionDescriptor>> {
    let status = device.receiver.get_status().map_err(operation)?;
    Ok(status
        .applications
        .iter()
        .map(|app| SessionDescriptor {
            app_id: app.app_id.clone(),
            display_name: app.display_name.clone(),
            session_id: app.session_id.clone(),
            transport_id: app.transport_id.clone(),
            namespaces: app.namespaces.clone(),
        })
        .collect())
}

fn session_status(
    device: &CastDevice<'static>,
    session_id: &str,
    transport_id: String,
) -> ReceiverResult<SessionStatus> {
    let receiver_status = device.receiver.get_status().map_err(operation)?;
    if !receiver_status
        .applications
        .iter()
        .any(|app| app.session_id == session_id)
    {
        return Err(ReceiverError::UnsolicitedClose(Channel::Session));
    }

    let volume = receiver_status.volume.level.map(|level| VolumeInfo {
        level: Some(f64::from(level)),
    });
    let media_status = device
        .media
        .get_status(transport_id, None)
        .map_err(operation)?;

    Ok(snapshot_from_media_status(&media_status, volume))
}

fn snapshot_from_media_status(status: &Status, volume: Option<VolumeInfo>) -> SessionStatus {
    let Some(entry) = status.entries.first() else {
        return SessionStatus {
            snapshot: StatusSnapshot {
                volume,
                ..Default::default()
            },
            media_session_id: None,
        };
    };

    let player_state = match entry.player_state {
        CastPlayerState::Idle => PlayerState::Idle,
        CastPlayerState::Playing => PlayerState::Playing,
        CastPlayerState::Paused => PlayerState::Paused,
        CastPlayerState::Buffering => PlayerState::Buffering,
    };

    SessionStatus {
        snapshot: StatusSnapshot {
            player_state: Some(player_state),
            current_time_seconds: entry.current_time.map(f64::from),
            media: entry.media.as_ref().map(|media| MediaInfo {
                duration_seconds: media.duration.map(f64::from),
            }),
            volume,
            playback_rate: Some(f64::from(entry.playback_rate)),
        },
        media_session_id: Some(entry.media_session_id),
    }
}

/// Capabilities granted by the namespaces a session listens on.
pub fn capabilities_for(namespaces: &[String]) -> Capabilities {
    if namespaces.iter().any(|ns| ns == CAST_MEDIA_NAMESPACE) {
        Capabilities::MEDIA
    } else {
        Capabilities::NONE
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// Opens Cast connections, one worker thread per connection.
#[derive(Debug, Default, Clone)]
pub struct CastConnector;

impl CastConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReceiverConnector for CastConnector {
    async fn connect(&self, address: &DeviceAddress) -> ReceiverResult<Arc<dyn ReceiverConnection>> {
        log::debug!("[Cast] Connecting to {}", address);

        let host = address.ip.to_string();
        let port = address.port;
        let (requests, inbox) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = oneshot::channel();
        let closed = CancellationToken::new();
        let worker_closed = closed.clone();

        thread::Builder::new()
            .name("cast-worker".into())
            .spawn(move || match open_device(host, port) {
                Ok(device) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        run_worker(device, inbox, worker_closed);
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(operation)?;

        ready_rx
            .await
            .map_err(|_| operation("cast worker exited before connecting"))??;

        log::debug!("[Cast] Connected to {}", address);
        Ok(Arc::new(CastConnection { requests, closed }))
    }
}

/// An open Cast connection.
pub struct CastConnection {
    requests: Sender<Request>,
    closed: CancellationToken,
}

#[async_trait]
impl ReceiverConnection for CastConnection {
    async fn list_sessions(&self) -> ReceiverResult<Vec<SessionDescriptor>> {
        call(&self.requests, Request::ListSessions).await
    }

    async fn join(&self, session: &SessionDescriptor) -> ReceiverResult<Arc<dyn ReceiverPlayer>> {
        let transport_id = session.transport_id.clone();
        call(&self.requests, |reply| Request::Join {
            transport_id,
            reply,
        })
        .await?;

        Ok(Arc::new(CastPlayer {
            requests: self.requests.clone(),
            session: session.clone(),
            capabilities: capabilities_for(&session.namespaces),
            media_session_id: Mutex::new(None),
            closed: self.closed.child_token(),
        }))
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    fn close(&self) {
        let _ = self.requests.send(Request::Close);
    }
}

/// Media channel of a joined Cast session.
pub struct CastPlayer {
    requests: Sender<Request>,
    session: SessionDescriptor,
    capabilities: Capabilities,
    /// Learned from the latest status; media commands need it.
    media_session_id: Mutex<Option<i32>>,
    closed: CancellationToken,
}

impl CastPlayer {
    async fn media(&self, command: MediaCommand) -> ReceiverResult<()> {
        let media_session_id = (*self.media_session_id.lock())
            .ok_or_else(|| operation("no media loaded in session"))?;
        let transport_id = self.session.transport_id.clone();
        call(&self.requests, |reply| Request::Media {
            transport_id,
            media_session_id,
            command,
            reply,
        })
        .await
    }
}

#[async_trait]
impl ReceiverPlayer for CastPlayer {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn get_status(&self) -> ReceiverResult<StatusSnapshot> {
        let session_id = self.session.session_id.clone();
        let transport_id = self.session.transport_id.clone();
        let result = call(&self.requests, |reply| Request::Status {
            session_id,
            transport_id,
            reply,
        })
        .await;

        match result {
            Ok(status) => {
                *self.media_session_id.lock() = status.media_session_id;
                Ok(status.snapshot)
            }
            Err(e) => {
                if matches!(e, ReceiverError::UnsolicitedClose(Channel::Session)) {
                    log::debug!(
                        "[Cast] Session {} is no longer running",
                        self.session.session_id
                    );
                    self.closed.cancel();
                }
                Err(e)
            }
        }
    }

    async fn play(&self) -> ReceiverResult<()> {
        self.media(MediaCommand::Play).await
    }

    async fn pause(&self) -> ReceiverResult<()> {
        self.media(MediaCommand::Pause).await
    }

    async fn stop(&self) -> ReceiverResult<()> {
        self.media(MediaCommand::Stop).await
    }

    async fn seek(&self, position_seconds: f64) -> ReceiverResult<()> {
        self.media(MediaCommand::Seek(position_seconds as f32)).await
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    fn close(&self) {
        let _ = self.requests.send(Request::Leave {
            transport_id: self.session.transport_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_namespace_grants_transport_controls() {
        let caps = capabilities_for(&[
            "urn:x-cast:com.google.cast.debugoverlay".to_string(),
            CAST_MEDIA_NAMESPACE.to_string(),
        ]);
        assert_eq!(caps, Capabilities::MEDIA);
    }

    #[test]
    fn sessions_without_media_namespace_have_no_capabilities() {
        let caps = capabilities_for(&["urn:x-cast:com.example.custom".to_string()]);
        assert!(caps.is_empty());
    }

    #[tokio::test]
    async fn call_reports_connection_close_when_worker_is_gone() {
        let (requests, inbox) = crossbeam_channel::unbounded::<Request>();
        drop(inbox);
        let err = call(&requests, Request::ListSessions).await.unwrap_err();
        assert!(matches!(
            err,
            ReceiverError::UnsolicitedClose(Channel::Connection)
        ));
    }

    #[tokio::test]
    async fn media_command_without_media_session_fails() {
        let (requests, _inbox) = crossbeam_channel::unbounded();
        let player = CastPlayer {
            requests,
            session: SessionDescriptor {
                app_id: "CC1AD845".into(),
                display_name: "Default Media Receiver".into(),
                session_id: "s-1".into(),
                transport_id: "t-1".into(),
                namespaces: vec![CAST_MEDIA_NAMESPACE.into()],
            },
            capabilities: Capabilities::MEDIA,
            media_session_id: Mutex::new(None),
            closed: CancellationToken::new(),
        };
        assert!(matches!(
            player.play().await,
            Err(ReceiverError::Operation(_))
        ));
    }
}
