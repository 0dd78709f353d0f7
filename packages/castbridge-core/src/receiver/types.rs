//! Receiver-side value types.
//!
//! These are the values exchanged with the receiver collaborators: where a
//! device lives, which application sessions run on it, what a joined session
//! is able to do, and the status snapshots it reports.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol_constants::{BACKDROP_APP_ID, CAST_DEFAULT_PORT};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Which receiver channel closed without us asking for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    /// The device connection itself.
    Connection,
    /// The media channel of a joined session.
    Session,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Errors produced by receiver requests.
///
/// All variants drive the same failure transition of the current phase; only
/// [`ReceiverError::UnsolicitedClose`] gets special treatment while polling.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The receiver answered with an error, or the request could not be sent.
    #[error("receiver operation failed: {0}")]
    Operation(String),

    /// A channel closed that we did not close ourselves.
    #[error("receiver {0} closed unexpectedly")]
    UnsolicitedClose(Channel),
}

impl ReceiverError {
    /// Returns true if this error reports an unsolicited channel close.
    #[must_use]
    pub fn is_unsolicited_close(&self) -> bool {
        matches!(self, Self::UnsolicitedClose(_))
    }
}

/// Result type for receiver operations.
pub type ReceiverResult<T> = Result<T, ReceiverError>;

// ─────────────────────────────────────────────────────────────────────────────
// Addressing and sessions
// ─────────────────────────────────────────────────────────────────────────────

/// Network address of a discovered receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAddress {
    /// IPv4 address of the device.
    pub ip: Ipv4Addr,
    /// Cast control port (8009 unless the device advertises otherwise).
    pub port: u16,
    /// Human-readable device name, when advertised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
}

impl DeviceAddress {
    /// Address on the default Cast port without a friendly name.
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            port: CAST_DEFAULT_PORT,
            friendly_name: None,
        }
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.friendly_name {
            Some(name) => write!(f, "{} ({}:{})", name, self.ip, self.port),
            None => write!(f, "{}:{}", self.ip, self.port),
        }
    }
}

/// A running application session on the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub app_id: String,
    pub display_name: String,
    pub session_id: String,
    /// Destination id used to open a virtual connection to the session.
    pub transport_id: String,
    /// Namespaces the session application listens on.
    pub namespaces: Vec<String>,
}

impl SessionDescriptor {
    /// True unless the session is the receiver's idle backdrop.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.app_id != BACKDROP_APP_ID
    }
}

/// Picks the session to join: the first one, in listing order, that is not
/// the backdrop application.
pub fn select_session(sessions: &[SessionDescriptor]) -> Option<&SessionDescriptor> {
    sessions.iter().find(|s| s.is_eligible())
}

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// Capability descriptor attached to a player when it is joined.
///
/// Commands whose capability is missing are dropped by the bridge adapter
/// before reaching the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const PLAY: Self = Self(1 << 0);
    pub const PAUSE: Self = Self(1 << 1);
    pub const STOP: Self = Self(1 << 2);
    pub const SEEK: Self = Self(1 << 3);
    pub const NEXT: Self = Self(1 << 4);
    pub const PREVIOUS: Self = Self(1 << 5);
    pub const OPEN: Self = Self(1 << 6);

    /// Everything a session on the standard media namespace accepts.
    pub const MEDIA: Self = Self(Self::PLAY.0 | Self::PAUSE.0 | Self::STOP.0 | Self::SEEK.0);

    /// Returns true if every flag of `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Playback state reported by the receiver's media channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
    Buffering,
    /// Any state string this bridge does not know about.
    #[serde(other)]
    Unknown,
}

/// Media item currently loaded in the session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    #[serde(rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// Receiver volume.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    /// Level in `0.0..=1.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
}

/// One status report of a joined session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_state: Option<PlayerState>,
    #[serde(rename = "currentTime", skip_serializing_if = "Option::is_none")]
    pub current_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_rate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(app_id: &str) -> SessionDescriptor {
        SessionDescriptor {
            app_id: app_id.to_string(),
            display_name: app_id.to_string(),
            session_id: format!("session-{}", app_id),
            transport_id: format!("transport-{}", app_id),
            namespaces: vec![],
        }
    }

    #[test]
    fn select_session_skips_backdrop_regardless_of_order() {
        let sessions = vec![session(BACKDROP_APP_ID), session("CC1AD845")];
        assert_eq!(select_session(&sessions).unwrap().app_id, "CC1AD845");

        let reversed = vec![session("CC1AD845"), session(BACKDROP_APP_ID)];
        assert_eq!(select_session(&reversed).unwrap().app_id, "CC1AD845");
    }

    #[test]
    fn select_session_takes_first_eligible() {
        let sessions = vec![session("AAAA"), session("BBBB")];
        assert_eq!(select_session(&sessions).unwrap().app_id, "AAAA");
    }

    #[test]
    fn select_session_none_when_only_backdrop() {
        assert!(select_session(&[session(BACKDROP_APP_ID)]).is_none());
        assert!(select_session(&[]).is_none());
    }

    #[test]
    fn media_capabilities_contain_transport_controls() {
        let caps = Capabilities::MEDIA;
        assert!(caps.contains(Capabilities::PLAY));
        assert!(caps.contains(Capabilities::PAUSE | Capabilities::SEEK));
        assert!(!caps.contains(Capabilities::NEXT));
        assert!(Capabilities::NONE.is_empty());
    }

    #[test]
    fn unknown_player_state_deserializes() {
        let state: PlayerState = serde_json::from_str(r#""LOADING""#).unwrap();
        assert_eq!(state, PlayerState::Unknown);
        let state: PlayerState = serde_json::from_str(r#""PLAYING""#).unwrap();
        assert_eq!(state, PlayerState::Playing);
    }

    #[test]
    fn snapshot_deserializes_from_media_status() {
        let snapshot: StatusSnapshot = serde_json::from_str(
            r#"{
                "playerState": "PAUSED",
                "currentTime": 12.5,
                "media": { "duration": 240.0 },
                "volume": { "level": 0.4 },
                "playbackRate": 1.0
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.player_state, Some(PlayerState::Paused));
        assert_eq!(snapshot.current_time_seconds, Some(12.5));
        assert_eq!(snapshot.media.unwrap().duration_seconds, Some(240.0));
        assert_eq!(snapshot.volume.unwrap().level, Some(0.4));
    }

    #[test]
    fn unsolicited_close_is_detected() {
        assert!(ReceiverError::UnsolicitedClose(Channel::Session).is_unsolicited_close());
        assert!(!ReceiverError::Operation("x".into()).is_unsolicited_close());
    }
}
