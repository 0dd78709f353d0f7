//! zbus implementation of the MPRIS player.
//!
//! Serves `org.mpris.MediaPlayer2` and `org.mpris.MediaPlayer2.Player` at
//! `/org/mpris/MediaPlayer2`. Property reads go to the adapter's current
//! snapshot; method calls are forwarded to it unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use zbus::names::InterfaceName;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{dbus_interface, Connection, SignalContext};

use super::properties::{DesktopProperties, Metadata, PropertyName};
use super::transport::{DesktopTransport, PlayerMethods, TransportResult};
use crate::protocol_constants::{MPRIS_OBJECT_PATH, MPRIS_PLAYER_INTERFACE};

// ─────────────────────────────────────────────────────────────────────────────
// Value conversion
// ─────────────────────────────────────────────────────────────────────────────

fn metadata_map(metadata: &Metadata) -> HashMap<String, Value<'static>> {
    let mut map = HashMap::new();
    if let Some(track_id) = &metadata.track_id {
        match ObjectPath::try_from(track_id.clone()) {
            Ok(path) => {
                map.insert("mpris:trackid".to_string(), Value::from(path));
            }
            Err(e) => log::warn!("[MPRIS] Invalid track id `{}`: {}", track_id, e),
        }
    }
    if let Some(length) = metadata.length {
        map.insert("mpris:length".to_string(), Value::from(length));
    }
    map
}

fn property_value(properties: &DesktopProperties, name: PropertyName) -> Value<'static> {
    match name {
        PropertyName::PlaybackStatus => Value::from(properties.playback_status.as_str()),
        PropertyName::LoopStatus => Value::from(properties.loop_status.as_str()),
        PropertyName::Rate => Value::from(properties.rate),
        PropertyName::Shuffle => Value::from(properties.shuffle),
        PropertyName::Metadata => Value::from(metadata_map(&properties.metadata)),
        PropertyName::Volume => Value::from(properties.volume),
        PropertyName::Position => Value::from(properties.position),
        PropertyName::MinimumRate => Value::from(properties.minimum_rate),
        PropertyName::MaximumRate => Value::from(properties.maximum_rate),
        PropertyName::CanGoNext => Value::from(properties.can_go_next),
        PropertyName::CanGoPrevious => Value::from(properties.can_go_previous),
        PropertyName::CanPlay => Value::from(properties.can_play),
        PropertyName::CanPause => Value::from(properties.can_pause),
        PropertyName::CanSeek => Value::from(properties.can_seek),
        PropertyName::CanControl => Value::from(properties.can_control),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interfaces
// ─────────────────────────────────────────────────────────────────────────────

/// Root interface. The bridge has no window and cannot be quit remotely.
pub struct MediaPlayer2Root {
    identity: String,
}

#[dbus_interface(name = "org.mpris.MediaPlayer2")]
impl MediaPlayer2Root {
    fn raise(&self) {}

    fn quit(&self) {}

    #[dbus_interface(property)]
    fn can_quit(&self) -> bool {
        false
    }

    #[dbus_interface(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[dbus_interface(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[dbus_interface(property)]
    fn identity(&self) -> String {
        self.identity.clone()
    }

    #[dbus_interface(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        Vec::new()
    }

    #[dbus_interface(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Player interface backed by [`PlayerMethods`].
pub struct MediaPlayer2Player {
    methods: Arc<dyn PlayerMethods>,
}

#[dbus_interface(name = "org.mpris.MediaPlayer2.Player")]
impl MediaPlayer2Player {
    fn next(&self) {
        self.methods.next();
    }

    fn previous(&self) {
        self.methods.previous();
    }

    fn pause(&self) {
        self.methods.pause();
    }

    fn play_pause(&self) {
        self.methods.play_pause();
    }

    fn stop(&self) {
        self.methods.stop();
    }

    fn play(&self) {
        self.methods.play();
    }

    fn seek(&self, offset: i64) {
        self.methods.seek(offset);
    }

    fn set_position(&self, track_id: OwnedObjectPath, position: i64) {
        self.methods.set_position(track_id.as_str(), position);
    }

    fn open_uri(&self, uri: String) {
        self.methods.open_uri(&uri);
    }

    #[dbus_interface(signal)]
    async fn seeked(ctxt: &SignalContext<'_>, position: i64) -> zbus::Result<()>;

    #[dbus_interface(property)]
    fn playback_status(&self) -> String {
        self.methods.properties().playback_status.as_str().to_string()
    }

    #[dbus_interface(property)]
    fn loop_status(&self) -> String {
        self.methods.properties().loop_status.as_str().to_string()
    }

    #[dbus_interface(property)]
    fn rate(&self) -> f64 {
        self.methods.properties().rate
    }

    #[dbus_interface(property)]
    fn shuffle(&self) -> bool {
        self.methods.properties().shuffle
    }

    #[dbus_interface(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        metadata_map(&self.methods.properties().metadata)
            .into_iter()
            .map(|(key, value)| (key, OwnedValue::from(value)))
            .collect()
    }

    #[dbus_interface(property)]
    fn volume(&self) -> f64 {
        self.methods.properties().volume
    }

    #[dbus_interface(property)]
    fn position(&self) -> i64 {
        self.methods.properties().position
    }

    #[dbus_interface(property)]
    fn minimum_rate(&self) -> f64 {
        self.methods.properties().minimum_rate
    }

    #[dbus_interface(property)]
    fn maximum_rate(&self) -> f64 {
        self.methods.properties().maximum_rate
    }

    #[dbus_interface(property)]
    fn can_go_next(&self) -> bool {
        self.methods.properties().can_go_next
    }

    #[dbus_interface(property)]
    fn can_go_previous(&self) -> bool {
        self.methods.properties().can_go_previous
    }

    #[dbus_interface(property)]
    fn can_play(&self) -> bool {
        self.methods.properties().can_play
    }

    #[dbus_interface(property)]
    fn can_pause(&self) -> bool {
        self.methods.properties().can_pause
    }

    #[dbus_interface(property)]
    fn can_seek(&self) -> bool {
        self.methods.properties().can_seek
    }

    #[dbus_interface(property)]
    fn can_control(&self) -> bool {
        self.methods.properties().can_control
    }
}

/// Exports both MPRIS interfaces on `connection`.
pub async fn serve(
    connection: &Connection,
    identity: &str,
    methods: Arc<dyn PlayerMethods>,
) -> TransportResult<()> {
    let server = connection.object_server();
    server
        .at(
            MPRIS_OBJECT_PATH,
            MediaPlayer2Root {
                identity: identity.to_string(),
            },
        )
        .await?;
    server
        .at(MPRIS_OBJECT_PATH, MediaPlayer2Player { methods })
        .await?;
    log::debug!("[MPRIS] Exported player at {}", MPRIS_OBJECT_PATH);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// [`DesktopTransport`] over a zbus session connection.
pub struct ZbusTransport {
    connection: Connection,
    bus_name: String,
}

impl ZbusTransport {
    pub fn new(connection: Connection, bus_name: String) -> Self {
        Self {
            connection,
            bus_name,
        }
    }

    fn signal_context(&self) -> TransportResult<SignalContext<'static>> {
        Ok(SignalContext::new(&self.connection, MPRIS_OBJECT_PATH)?)
    }
}

#[async_trait]
impl DesktopTransport for ZbusTransport {
    async fn request_name(&self) -> TransportResult<()> {
        self.connection.request_name(self.bus_name.as_str()).await?;
        log::info!("[MPRIS] Acquired bus name {}", self.bus_name);
        Ok(())
    }

    async fn release_name(&self) -> TransportResult<()> {
        self.connection.release_name(self.bus_name.as_str()).await?;
        log::info!("[MPRIS] Released bus name {}", self.bus_name);
        Ok(())
    }

    async fn properties_changed(
        &self,
        properties: &DesktopProperties,
        changed: &[PropertyName],
    ) -> TransportResult<()> {
        if changed.is_empty() {
            return Ok(());
        }

        let values: Vec<(&'static str, Value<'static>)> = changed
            .iter()
            .map(|name| (name.as_str(), property_value(properties, *name)))
            .collect();
        let changed_properties: HashMap<&str, &Value<'_>> =
            values.iter().map(|(name, value)| (*name, value)).collect();

        log::debug!(
            "[MPRIS] PropertiesChanged: {}",
            changed
                .iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let ctxt = self.signal_context()?;
        zbus::fdo::Properties::properties_changed(
            &ctxt,
            InterfaceName::from_static_str_unchecked(MPRIS_PLAYER_INTERFACE),
            &changed_properties,
            &[],
        )
        .await?;
        Ok(())
    }

    async fn seeked(&self, position: i64) -> TransportResult<()> {
        log::info!(
            "[MPRIS] emit signal: path=`{}` interface=`{}` signal=`Seeked` parameters=[{}]",
            MPRIS_OBJECT_PATH,
            MPRIS_PLAYER_INTERFACE,
            position
        );
        let ctxt = self.signal_context()?;
        MediaPlayer2Player::seeked(&ctxt, position).await?;
        Ok(())
    }
}
