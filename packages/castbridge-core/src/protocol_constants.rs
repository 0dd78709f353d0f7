//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (Cast v2, MPRIS,
//! D-Bus) and changing them would break protocol compliance.

// ─────────────────────────────────────────────────────────────────────────────
// Cast (receiver side)
// ─────────────────────────────────────────────────────────────────────────────

/// Cast mDNS service type (note: trailing dot is required by mdns-sd).
pub const CAST_SERVICE_TYPE: &str = "_googlecast._tcp.local.";

/// TCP port of the Cast v2 control channel.
pub const CAST_DEFAULT_PORT: u16 = 8009;

/// Destination id of the platform receiver on every Cast device.
pub const CAST_RECEIVER_DESTINATION: &str = "receiver-0";

/// Namespace exposed by sessions that accept media-control commands.
pub const CAST_MEDIA_NAMESPACE: &str = "urn:x-cast:com.google.cast.media";

/// Application id of the receiver's idle screen (the "Backdrop" app).
///
/// Sessions running this app never carry user media and are skipped when
/// looking for a session to join.
pub const BACKDROP_APP_ID: &str = "E8C28D3C";

/// Interval between heartbeat pings while the Cast connection is idle (seconds).
///
/// Receivers drop virtual connections that stay silent for ~10 seconds.
pub const CAST_HEARTBEAT_INTERVAL_SECS: u64 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// MPRIS (desktop side)
// ─────────────────────────────────────────────────────────────────────────────

/// Object path every MPRIS player is exported at.
pub const MPRIS_OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";

/// Root MPRIS interface name.
pub const MPRIS_ROOT_INTERFACE: &str = "org.mpris.MediaPlayer2";

/// Player MPRIS interface name.
pub const MPRIS_PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

/// Prefix of the well-known bus name (`org.mpris.MediaPlayer2.<player>`).
pub const MPRIS_BUS_NAME_PREFIX: &str = "org.mpris.MediaPlayer2.";

/// `Identity` reported by the root interface.
pub const MPRIS_IDENTITY: &str = "Chromecast";

/// Synthetic track id reported in `Metadata` (the receiver has no track list).
pub const MPRIS_TRACK_ID: &str = "/com/google/chromecast/tracks/0";

/// Lowest playback rate advertised to desktop clients.
pub const MPRIS_MINIMUM_RATE: f64 = 0.25;

/// Highest playback rate advertised to desktop clients.
pub const MPRIS_MAXIMUM_RATE: f64 = 2.0;

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

/// Position drift (milliseconds) above which a `Seeked` signal is emitted.
///
/// Ordinary playback progress between two polls stays well below this value;
/// larger drift means someone jumped within the track.
pub const SEEK_DRIFT_THRESHOLD_MS: i64 = 500;

/// Microseconds per second (MPRIS time unit conversion).
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;
