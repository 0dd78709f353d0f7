//! Exported MPRIS player properties.
//!
//! [`DesktopProperties`] is an immutable snapshot: every status translation
//! produces a new value that replaces the previous one wholesale, and the
//! set of changed properties is computed by [`DesktopProperties::diff`].

use serde::Serialize;

use crate::protocol_constants::{MPRIS_MAXIMUM_RATE, MPRIS_MINIMUM_RATE, MPRIS_TRACK_ID};

/// `PlaybackStatus` values reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Buffering,
    #[default]
    Idle,
}

impl PlaybackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Buffering => "Buffering",
            Self::Idle => "Idle",
        }
    }
}

/// `LoopStatus` values. The receiver has no loop control, so the bridge
/// always reports `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum LoopStatus {
    #[default]
    None,
    Track,
    Playlist,
}

impl LoopStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Track => "Track",
            Self::Playlist => "Playlist",
        }
    }
}

/// Track metadata (`a{sv}` on the bus).
///
/// Empty when no media is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Metadata {
    /// `mpris:trackid`.
    pub track_id: Option<String>,
    /// `mpris:length` in microseconds.
    pub length: Option<i64>,
}

impl Metadata {
    /// Metadata of the synthetic track with the given length.
    pub fn track(length: i64) -> Self {
        Self {
            track_id: Some(MPRIS_TRACK_ID.to_string()),
            length: Some(length),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.track_id.is_none() && self.length.is_none()
    }
}

/// Names of the player interface properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyName {
    PlaybackStatus,
    LoopStatus,
    Rate,
    Shuffle,
    Metadata,
    Volume,
    Position,
    MinimumRate,
    MaximumRate,
    CanGoNext,
    CanGoPrevious,
    CanPlay,
    CanPause,
    CanSeek,
    CanControl,
}

impl PropertyName {
    /// Property name as exported on the bus.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlaybackStatus => "PlaybackStatus",
            Self::LoopStatus => "LoopStatus",
            Self::Rate => "Rate",
            Self::Shuffle => "Shuffle",
            Self::Metadata => "Metadata",
            Self::Volume => "Volume",
            Self::Position => "Position",
            Self::MinimumRate => "MinimumRate",
            Self::MaximumRate => "MaximumRate",
            Self::CanGoNext => "CanGoNext",
            Self::CanGoPrevious => "CanGoPrevious",
            Self::CanPlay => "CanPlay",
            Self::CanPause => "CanPause",
            Self::CanSeek => "CanSeek",
            Self::CanControl => "CanControl",
        }
    }
}

impl std::fmt::Display for PropertyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every player interface property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DesktopProperties {
    pub playback_status: PlaybackStatus,
    pub loop_status: LoopStatus,
    pub rate: f64,
    pub shuffle: bool,
    pub metadata: Metadata,
    pub volume: f64,
    /// Microseconds.
    pub position: i64,
    pub minimum_rate: f64,
    pub maximum_rate: f64,
    pub can_go_next: bool,
    pub can_go_previous: bool,
    pub can_play: bool,
    pub can_pause: bool,
    pub can_seek: bool,
    pub can_control: bool,
}

impl Default for DesktopProperties {
    fn default() -> Self {
        Self::idle()
    }
}

impl DesktopProperties {
    /// Properties of a bridge with no joined session.
    pub fn idle() -> Self {
        Self {
            playback_status: PlaybackStatus::Idle,
            loop_status: LoopStatus::None,
            rate: 1.0,
            shuffle: false,
            metadata: Metadata::default(),
            volume: 1.0,
            position: 0,
            minimum_rate: MPRIS_MINIMUM_RATE,
            maximum_rate: MPRIS_MAXIMUM_RATE,
            can_go_next: false,
            can_go_previous: false,
            can_play: false,
            can_pause: false,
            can_seek: false,
            can_control: true,
        }
    }

    /// Properties that differ between `self` and `next`, in export order.
    ///
    /// `Position` is never reported: MPRIS clients extrapolate it and are told
    /// about jumps through `Seeked` instead.
    pub fn diff(&self, next: &Self) -> Vec<PropertyName> {
        let mut changed = Vec::new();
        let mut check = |differs: bool, name: PropertyName| {
            if differs {
                changed.push(name);
            }
        };

        check(
            self.playback_status != next.playback_status,
            PropertyName::PlaybackStatus,
        );
        check(self.loop_status != next.loop_status, PropertyName::LoopStatus);
        check(self.rate != next.rate, PropertyName::Rate);
        check(self.shuffle != next.shuffle, PropertyName::Shuffle);
        check(self.metadata != next.metadata, PropertyName::Metadata);
        check(self.volume != next.volume, PropertyName::Volume);
        check(
            self.minimum_rate != next.minimum_rate,
            PropertyName::MinimumRate,
        );
        check(
            self.maximum_rate != next.maximum_rate,
            PropertyName::MaximumRate,
        );
        check(self.can_go_next != next.can_go_next, PropertyName::CanGoNext);
        check(
            self.can_go_previous != next.can_go_previous,
            PropertyName::CanGoPrevious,
        );
        check(self.can_play != next.can_play, PropertyName::CanPlay);
        check(self.can_pause != next.can_pause, PropertyName::CanPause);
        check(self.can_seek != next.can_seek, PropertyName::CanSeek);
        check(self.can_control != next.can_control, PropertyName::CanControl);

        changed
    }
}
