//! Receiver status to MPRIS property translation.
//!
//! Pure logic, no I/O: [`translate`] maps one [`StatusSnapshot`] onto the
//! previous [`DesktopProperties`], reports which properties changed and
//! decides whether the position jumped far enough to warrant a `Seeked`
//! signal.

use crate::mpris::properties::{DesktopProperties, Metadata, PlaybackStatus, PropertyName};
use crate::protocol_constants::SEEK_DRIFT_THRESHOLD_MS;
use crate::receiver::{PlayerState, StatusSnapshot};
use crate::utils::{seconds_to_micros, seconds_to_millis};

/// A detected position jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seeked {
    /// New position in microseconds.
    pub position: i64,
    /// Sync baseline to use for the next translation (milliseconds).
    pub baseline_ms: i64,
}

/// Outcome of one translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Replacement property snapshot.
    pub next: DesktopProperties,
    /// Changed properties, `Position` excluded.
    pub changed: Vec<PropertyName>,
    pub seeked: Option<Seeked>,
}

/// Translates a status snapshot.
///
/// `baseline_ms` is the wall-clock time at which playback would have been at
/// position zero, as of the last sync. While playing normally,
/// `now_ms - baseline_ms` tracks the reported position; a larger drift means
/// the position jumped.
pub fn translate(
    previous: &DesktopProperties,
    snapshot: &StatusSnapshot,
    now_ms: i64,
    baseline_ms: i64,
) -> Translation {
    let mut next = previous.clone();

    next.rate = match snapshot.playback_rate {
        Some(rate) if rate != 0.0 => rate,
        _ => 1.0,
    };

    if let Some(level) = snapshot.volume.and_then(|v| v.level) {
        next.volume = level;
    }

    match snapshot.media {
        Some(media) => {
            let length = media.duration_seconds.map(seconds_to_micros).unwrap_or(0);
            next.metadata = Metadata::track(length);
            next.can_seek = true;
        }
        None => {
            next.metadata = Metadata::default();
            next.can_seek = false;
        }
    }

    let (status, can_play, can_pause) = match snapshot.player_state {
        Some(PlayerState::Playing) => (PlaybackStatus::Playing, true, false),
        Some(PlayerState::Paused) => (PlaybackStatus::Paused, false, true),
        Some(PlayerState::Buffering) => (PlaybackStatus::Buffering, true, false),
        _ => (PlaybackStatus::Idle, false, false),
    };
    next.playback_status = status;
    next.can_play = can_play;
    next.can_pause = can_pause;

    let current_seconds = snapshot.current_time_seconds.unwrap_or(0.0);
    let current_ms = seconds_to_millis(current_seconds);
    next.position = seconds_to_micros(current_seconds);

    let changed = previous.diff(&next);

    // Receiver-reported times are unbounded; keep the arithmetic saturating.
    let drift = now_ms
        .saturating_sub(baseline_ms)
        .saturating_sub(current_ms)
        .saturating_abs();
    let seeked = (drift > SEEK_DRIFT_THRESHOLD_MS && next.can_play).then(|| Seeked {
        position: next.position,
        baseline_ms: now_ms.saturating_sub(current_ms),
    });

    Translation {
        next,
        changed,
        seeked,
    }
}
