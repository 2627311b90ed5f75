// ── Device lifecycle ──
//
// A `Device` owns the feature controllers of one remote device and drives
// them through the connection state machine. Controllers share an
// `Arc<DeviceContext>` for everything device-wide: command channel,
// component store, persistent dictionaries and configuration.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::alarms::AlarmsController;
use crate::anti_flicker::{AntiFlickerController, CountryLocator};
use crate::camera::{CameraController, CameraRouter};
use crate::command::{Command, CommandChannel};
use crate::component::ComponentStore;
use crate::config::ControllerConfig;
use crate::error::{CoreError, RejectedEvent};
use crate::event::Event;
use crate::gps::GpsController;
use crate::store::{Dictionary, PersistentStore};

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: the device and its stored data were dropped.
    Forgotten,
}

impl ConnectionState {
    /// Whether moving to `to` is a legal transition.
    pub fn can_become(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Disconnected, Self::Connecting | Self::Forgotten)
                | (Self::Connecting, Self::Connected)
                | (Self::Connecting | Self::Connected, Self::Disconnected)
        )
    }

    /// A protocol session exists: events arrive and commands can go out.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

// ── Feature controller contract ──────────────────────────────────────

/// Lifecycle and event hooks every feature controller implements.
///
/// Hooks are called sequentially, once per controller per transition.
pub trait FeatureController {
    /// A new session starts; per-session caches must be cleared.
    fn on_connecting(&mut self) {}

    /// The session is complete; presets are replayed here.
    fn on_connected(&mut self) {}

    fn on_disconnected(&mut self) {}

    /// The device is being forgotten; stored data must be dropped.
    fn on_forgetting(&mut self) {}

    /// The device switched to another preset dictionary.
    fn on_preset_change(&mut self) {}

    /// Handles one inbound event. Events for other features are ignored.
    fn on_event(&mut self, event: &Event) -> Result<(), RejectedEvent>;
}

/// The closed set of controllers a device runs.
enum Feature {
    Cameras(CameraRouter),
    Alarms(AlarmsController),
    AntiFlicker(AntiFlickerController),
    Gps(GpsController),
}

impl Feature {
    fn controller(&mut self) -> &mut dyn FeatureController {
        match self {
            Self::Cameras(router) => router,
            Self::Alarms(alarms) => alarms,
            Self::AntiFlicker(anti_flicker) => anti_flicker,
            Self::Gps(gps) => gps,
        }
    }
}

// ── DeviceContext ────────────────────────────────────────────────────

/// Device-wide services shared by every controller of a device.
pub struct DeviceContext {
    uid: String,
    config: ControllerConfig,
    channel: Arc<dyn CommandChannel>,
    components: Arc<ComponentStore>,
    device_dict: Option<Dictionary>,
    preset_dict: ArcSwapOption<Dictionary>,
    locator: Option<Arc<dyn CountryLocator>>,
    state: watch::Sender<ConnectionState>,
}

impl DeviceContext {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn components(&self) -> &Arc<ComponentStore> {
        &self.components
    }

    pub fn channel(&self) -> &Arc<dyn CommandChannel> {
        &self.channel
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Hands `command` to the acknowledged channel. Returns `false` without
    /// touching the channel when no session is live.
    pub fn send(&self, command: Command) -> bool {
        if !self.state().is_live() {
            debug!(uid = %self.uid, ?command, "offline, command not sent");
            return false;
        }
        self.channel.send(command)
    }

    /// Root of the device dictionary, `None` without offline settings.
    pub fn device_root(&self) -> Option<&Dictionary> {
        self.device_dict.as_ref()
    }

    /// Sub-scope `key` of the device dictionary.
    pub fn device_dictionary(&self, key: &str) -> Option<Dictionary> {
        self.device_dict.as_ref().map(|dict| dict.dictionary(key))
    }

    /// Sub-scope `key` of the current preset dictionary.
    pub fn preset_dictionary(&self, key: &str) -> Option<Dictionary> {
        self.preset_dict.load_full().map(|dict| dict.dictionary(key))
    }

    pub fn country_locator(&self) -> Option<&Arc<dyn CountryLocator>> {
        self.locator.as_ref()
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("uid", &self.uid)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ── Device ───────────────────────────────────────────────────────────

/// One remote device and its feature controllers.
pub struct Device {
    context: Arc<DeviceContext>,
    features: Vec<Feature>,
}

/// Builder for [`Device`].
pub struct DeviceBuilder {
    uid: String,
    channel: Arc<dyn CommandChannel>,
    store: Option<PersistentStore>,
    config: ControllerConfig,
    locator: Option<Arc<dyn CountryLocator>>,
}

impl DeviceBuilder {
    /// Backing store for capabilities and presets. Without one (or with
    /// offline settings disabled) nothing is persisted.
    pub fn store(mut self, store: PersistentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables anti-flicker `Auto` emulation on devices that lack it.
    pub fn country_locator(mut self, locator: Arc<dyn CountryLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn build(self) -> Device {
        let (device_dict, preset_dict) = match (&self.store, self.config.offline_settings) {
            (Some(store), true) => (
                Some(store.device_dictionary(&self.uid)),
                Some(Arc::new(store.preset_dictionary(&self.uid))),
            ),
            _ => (None, None),
        };
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        let context = Arc::new(DeviceContext {
            uid: self.uid,
            config: self.config,
            channel: self.channel,
            components: Arc::new(ComponentStore::new()),
            device_dict,
            preset_dict: ArcSwapOption::new(preset_dict),
            locator: self.locator,
            state,
        });

        let features = vec![
            Feature::Cameras(CameraRouter::new(Arc::clone(&context))),
            Feature::Alarms(AlarmsController::new(Arc::clone(&context))),
            Feature::AntiFlicker(AntiFlickerController::new(Arc::clone(&context))),
            Feature::Gps(GpsController::new(Arc::clone(&context))),
        ];
        info!(uid = %context.uid, "device created");
        Device { context, features }
    }
}

impl Device {
    /// Creates a device with every feature controller, restoring what the
    /// store remembers about it.
    pub fn new(
        uid: impl Into<String>,
        channel: Arc<dyn CommandChannel>,
        store: Option<PersistentStore>,
        config: ControllerConfig,
    ) -> Self {
        let builder = Self::builder(uid, channel).config(config);
        match store {
            Some(store) => builder.store(store).build(),
            None => builder.build(),
        }
    }

    pub fn builder(uid: impl Into<String>, channel: Arc<dyn CommandChannel>) -> DeviceBuilder {
        DeviceBuilder {
            uid: uid.into(),
            channel,
            store: None,
            config: ControllerConfig::default(),
            locator: None,
        }
    }

    pub fn uid(&self) -> &str {
        self.context.uid()
    }

    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.context
    }

    /// Published components of this device.
    pub fn components(&self) -> &Arc<ComponentStore> {
        self.context.components()
    }

    pub fn state(&self) -> ConnectionState {
        self.context.state()
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.context.state.subscribe()
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    pub fn connecting(&mut self) -> Result<(), CoreError> {
        self.transition(ConnectionState::Connecting)?;
        self.each(|controller| controller.on_connecting());
        Ok(())
    }

    pub fn connected(&mut self) -> Result<(), CoreError> {
        self.transition(ConnectionState::Connected)?;
        self.each(|controller| controller.on_connected());
        Ok(())
    }

    pub fn disconnected(&mut self) -> Result<(), CoreError> {
        self.transition(ConnectionState::Disconnected)?;
        self.each(|controller| controller.on_disconnected());
        Ok(())
    }

    /// Drops everything stored about the device. Terminal.
    pub fn forget(&mut self) -> Result<(), CoreError> {
        self.transition(ConnectionState::Forgotten)?;
        self.each(|controller| controller.on_forgetting());
        if let Some(root) = self.context.device_root() {
            root.clear();
            root.commit()?;
        }
        Ok(())
    }

    /// Switches to another preset dictionary and lets every controller
    /// replay it.
    pub fn change_preset(&mut self, preset: Dictionary) {
        debug!(uid = %self.context.uid, ?preset, "preset changed");
        self.context.preset_dict.store(Some(Arc::new(preset)));
        self.each(|controller| controller.on_preset_change());
    }

    /// Routes one inbound event. A rejected event is logged and dropped;
    /// the session carries on.
    pub fn dispatch(&mut self, event: &Event) {
        if !self.state().is_live() {
            debug!(uid = %self.context.uid, ?event, "no live session, event dropped");
            return;
        }
        for feature in &mut self.features {
            if let Err(err) = feature.controller().on_event(event) {
                warn!(uid = %self.context.uid, error = %err, "rejected event");
            }
        }
    }

    /// The host location moved; features depending on it re-evaluate.
    pub fn location_changed(&mut self) {
        if let Some(anti_flicker) = self.anti_flicker_mut() {
            anti_flicker.location_changed();
        }
    }

    // ── Typed accessors ──────────────────────────────────────────────

    pub fn camera_mut(&mut self, id: u8) -> Option<&mut CameraController> {
        self.features.iter_mut().find_map(|feature| match feature {
            Feature::Cameras(router) => router.camera_mut(id),
            _ => None,
        })
    }

    /// Ids of every known camera, sorted.
    pub fn camera_ids(&self) -> Vec<u8> {
        self.features
            .iter()
            .find_map(|feature| match feature {
                Feature::Cameras(router) => Some(router.ids()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn anti_flicker_mut(&mut self) -> Option<&mut AntiFlickerController> {
        self.features.iter_mut().find_map(|feature| match feature {
            Feature::AntiFlicker(anti_flicker) => Some(anti_flicker),
            _ => None,
        })
    }

    fn transition(&self, to: ConnectionState) -> Result<(), CoreError> {
        let from = self.state();
        if !from.can_become(to) {
            return Err(CoreError::InvalidTransition { from, to });
        }
        info!(uid = %self.context.uid, %from, %to, "connection state changed");
        self.context.state.send_replace(to);
        Ok(())
    }

    fn each(&mut self, mut hook: impl FnMut(&mut dyn FeatureController)) {
        for feature in &mut self.features {
            hook(feature.controller());
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("context", &self.context)
            .field("features", &self.features.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::CommandQueue;

    fn device() -> (Device, tokio::sync::mpsc::UnboundedReceiver<Command>) {
        let (queue, rx) = CommandQueue::new();
        let device = Device::new("dev-1", Arc::new(queue), None, ControllerConfig::default());
        (device, rx)
    }

    #[test]
    fn legal_transitions_are_observable() {
        let (mut device, _rx) = device();
        let watcher = device.connection_state();

        device.connecting().unwrap();
        device.connected().unwrap();
        assert_eq!(*watcher.borrow(), ConnectionState::Connected);

        device.disconnected().unwrap();
        device.forget().unwrap();
        assert_eq!(device.state(), ConnectionState::Forgotten);
    }

    #[test]
    fn illegal_transition_is_an_error() {
        let (mut device, _rx) = device();
        let err = device.connected().unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: ConnectionState::Disconnected,
                to: ConnectionState::Connected,
            }
        ));
        assert_eq!(device.state(), ConnectionState::Disconnected);

        device.connecting().unwrap();
        assert!(device.forget().is_err(), "forget needs a disconnected device");
    }

    #[test]
    fn forgotten_is_terminal() {
        let (mut device, _rx) = device();
        device.forget().unwrap();
        assert!(device.connecting().is_err());
    }

    #[test]
    fn commands_are_not_sent_offline() {
        let (device, mut rx) = device();
        assert!(!device.context().send(Command::SetAntiFlickerMode(
            crate::model::AntiFlickerMode::Off
        )));
        assert!(rx.try_recv().is_err());
    }
}
