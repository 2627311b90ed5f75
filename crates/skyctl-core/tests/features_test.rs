#![allow(clippy::unwrap_used)]
// Scenario tests for alarms, anti-flicker, persistence and the device
// lifecycle as seen by observers.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use skyctl_core::event::{BatteryEvent, CameraEvent, PilotingEvent};
use skyctl_core::model::{
    AlarmKind, AlarmLevel, AntiFlickerMode, AntiFlickerValue, CameraMode, CameraModel,
};
use skyctl_core::{
    Alarms, AntiFlickerState, Applied, Command, CommandQueue, ComponentChange, ComponentKind,
    ControllerConfig, CountryLocator, Device, Event, PersistentStore,
};

// ── Helpers ─────────────────────────────────────────────────────────

const UID: &str = "drone-2";

const FIRST: u8 = 1 << 1;
const LAST: u8 = 1 << 2;
const REMOVE: u8 = 1 << 3;
const EMPTY: u8 = 1 << 0;

fn device(store: Option<PersistentStore>) -> (Device, UnboundedReceiver<Command>) {
    let (queue, rx) = CommandQueue::new();
    let device = Device::new(UID, Arc::new(queue), store, ControllerConfig::default());
    (device, rx)
}

fn connect(device: &mut Device) {
    device.connecting().unwrap();
    device.connected().unwrap();
}

fn drain(rx: &mut UnboundedReceiver<Command>) -> Vec<Command> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn battery_alert(alert: u32, level: u32, list_flags: u8) -> Event {
    Event::Battery(BatteryEvent::Alert {
        alert: Some(alert),
        level: Some(level),
        list_flags,
    })
}

fn piloting(event: PilotingEvent) -> Event {
    Event::Piloting(event)
}

fn alarms(device: &Device) -> Arc<Alarms> {
    device.components().get::<Alarms>(0).unwrap()
}

/// Country source the tests can move around.
struct MovableLocator(Mutex<String>);

impl MovableLocator {
    fn new(country: &str) -> Arc<Self> {
        Arc::new(Self(Mutex::new(country.to_owned())))
    }

    fn move_to(&self, country: &str) {
        *self.0.lock().unwrap() = country.to_owned();
    }
}

impl CountryLocator for MovableLocator {
    fn country_code(&self) -> Option<String> {
        Some(self.0.lock().unwrap().clone())
    }
}

fn anti_flicker_mode(mode: AntiFlickerMode, value: AntiFlickerMode) -> Event {
    Event::Camera(CameraEvent::AntiFlickerMode {
        mode: mode.to_wire(),
        value: value.to_wire(),
    })
}

fn anti_flicker(device: &Device) -> Arc<AntiFlickerState> {
    device.components().get::<AntiFlickerState>(0).unwrap()
}

// ── Alarms ──────────────────────────────────────────────────────────

#[test]
fn test_battery_alert_stream_replaces_the_map() {
    let (mut device, _rx) = device(None);
    connect(&mut device);

    device.dispatch(&battery_alert(0, 1, FIRST));
    assert_eq!(alarms(&device).level(AlarmKind::Power), AlarmLevel::Off, "not delivered yet");
    device.dispatch(&battery_alert(1, 2, LAST));

    let set = alarms(&device);
    assert_eq!(set.level(AlarmKind::Power), AlarmLevel::Warning);
    assert_eq!(set.level(AlarmKind::BatteryTooCold), AlarmLevel::Critical);
    assert_eq!(set.level(AlarmKind::BatteryTooHot), AlarmLevel::Off);

    device.dispatch(&battery_alert(2, 1, FIRST | LAST));
    let set = alarms(&device);
    assert_eq!(set.level(AlarmKind::Power), AlarmLevel::Off);
    assert_eq!(set.level(AlarmKind::BatteryTooCold), AlarmLevel::Off);
    assert_eq!(set.level(AlarmKind::BatteryTooHot), AlarmLevel::Warning);

    device.dispatch(&battery_alert(2, 0, REMOVE | LAST));
    assert_eq!(alarms(&device).raised().count(), 0);
}

#[test]
fn test_empty_battery_alert_clears_everything() {
    let (mut device, _rx) = device(None);
    connect(&mut device);
    device.dispatch(&battery_alert(0, 2, FIRST | LAST));
    assert_eq!(alarms(&device).level(AlarmKind::Power), AlarmLevel::Critical);

    device.dispatch(&Event::Battery(BatteryEvent::Alert {
        alert: None,
        level: None,
        list_flags: EMPTY,
    }));
    assert_eq!(alarms(&device).raised().count(), 0);
}

#[test]
fn test_piloting_alert_drives_power_until_battery_reports() {
    let (mut device, _rx) = device(None);
    connect(&mut device);

    device.dispatch(&piloting(PilotingEvent::AlertStateChanged { state: 4 }));
    assert_eq!(alarms(&device).level(AlarmKind::Power), AlarmLevel::Warning);

    device.dispatch(&battery_alert(1, 1, FIRST | LAST));
    device.dispatch(&piloting(PilotingEvent::AlertStateChanged { state: 3 }));
    let set = alarms(&device);
    assert_eq!(set.level(AlarmKind::Power), AlarmLevel::Off);
    assert_eq!(set.level(AlarmKind::BatteryTooCold), AlarmLevel::Warning);

    device.dispatch(&piloting(PilotingEvent::AlertStateChanged { state: 2 }));
    assert_eq!(alarms(&device).level(AlarmKind::MotorCutOut), AlarmLevel::Critical);
    device.dispatch(&piloting(PilotingEvent::AlertStateChanged { state: 0 }));
    assert_eq!(alarms(&device).level(AlarmKind::MotorCutOut), AlarmLevel::Off);
}

#[test]
fn test_hovering_difficulties_only_while_flying() {
    let (mut device, _rx) = device(None);
    connect(&mut device);

    device.dispatch(&piloting(PilotingEvent::HoveringWarning {
        no_gps_too_dark: 1,
        no_gps_too_high: 0,
    }));
    assert_eq!(
        alarms(&device).level(AlarmKind::HoveringDifficultiesNoGpsTooDark),
        AlarmLevel::Off
    );

    device.dispatch(&piloting(PilotingEvent::FlyingStateChanged { state: 2 }));
    assert_eq!(
        alarms(&device).level(AlarmKind::HoveringDifficultiesNoGpsTooDark),
        AlarmLevel::Warning
    );

    device.dispatch(&piloting(PilotingEvent::FlyingStateChanged { state: 4 }));
    assert_eq!(
        alarms(&device).level(AlarmKind::HoveringDifficultiesNoGpsTooDark),
        AlarmLevel::Off
    );
}

#[test]
fn test_alarms_are_withdrawn_on_disconnect() {
    let (mut device, _rx) = device(None);
    let mut changes = device.components().subscribe_changes();
    connect(&mut device);
    device.dispatch(&piloting(PilotingEvent::WindStateChanged { state: 2 }));
    assert_eq!(alarms(&device).level(AlarmKind::StrongWind), AlarmLevel::Critical);

    let mut stream = device.components().watch::<Alarms>(0).unwrap();
    device.disconnected().unwrap();
    assert_eq!(tokio_test::block_on(stream.changed()), Some(None));

    let unpublished: Vec<_> = std::iter::from_fn(|| changes.try_recv().ok())
        .filter_map(|change| match change {
            ComponentChange::Unpublished(key) => Some(key.kind),
            ComponentChange::Published(_) => None,
        })
        .collect();
    assert_eq!(unpublished, vec![ComponentKind::Alarms]);
}

// ── Anti-flicker ────────────────────────────────────────────────────

#[test]
fn test_auto_mode_is_emulated_from_location() {
    let locator = MovableLocator::new("US");
    let (queue, mut rx) = CommandQueue::new();
    let mut device = Device::builder(UID, Arc::new(queue))
        .country_locator(locator.clone())
        .build();

    device.connecting().unwrap();
    device.dispatch(&Event::Camera(CameraEvent::AntiFlickerCapabilities { modes: 0b111 }));
    device.connected().unwrap();
    assert!(anti_flicker(&device).mode.supported().contains(&AntiFlickerMode::Auto));

    let controller = device.anti_flicker_mut().unwrap();
    assert!(controller.is_auto_emulated());
    assert_eq!(controller.set_mode(AntiFlickerMode::Auto), Applied::Sent);
    assert_eq!(drain(&mut rx), vec![Command::SetAntiFlickerMode(AntiFlickerMode::Hz60)]);

    device.dispatch(&anti_flicker_mode(AntiFlickerMode::Hz60, AntiFlickerMode::Hz60));
    let state = anti_flicker(&device);
    assert_eq!(state.mode.value(), Some(&AntiFlickerMode::Auto));
    assert!(!state.mode.is_updating());
    assert_eq!(state.value, AntiFlickerValue::Hz60);

    locator.move_to("FR");
    device.location_changed();
    assert_eq!(drain(&mut rx), vec![Command::SetAntiFlickerMode(AntiFlickerMode::Hz50)]);

    device.location_changed();
    assert!(drain(&mut rx).is_empty(), "same country, nothing to send");
}

#[test]
fn test_auto_is_not_emulated_without_locator() {
    let (mut device, _rx) = device(None);
    device.connecting().unwrap();
    device.dispatch(&Event::Camera(CameraEvent::AntiFlickerCapabilities { modes: 0b111 }));
    device.connected().unwrap();

    let state = anti_flicker(&device);
    assert!(!state.mode.supported().contains(&AntiFlickerMode::Auto));
    assert_eq!(
        device.anti_flicker_mut().unwrap().set_mode(AntiFlickerMode::Auto),
        Applied::Rejected
    );
}

#[test]
fn test_auto_value_is_rejected() {
    let (mut device, _rx) = device(None);
    connect(&mut device);
    device.dispatch(&anti_flicker_mode(AntiFlickerMode::Hz50, AntiFlickerMode::Auto));
    assert_eq!(anti_flicker(&device).value, AntiFlickerValue::Unknown);
}

#[test]
fn test_anti_flicker_stays_published_offline() {
    let (mut device, _rx) = device(None);
    connect(&mut device);
    device.dispatch(&anti_flicker_mode(AntiFlickerMode::Hz50, AntiFlickerMode::Hz50));
    assert_eq!(anti_flicker(&device).value, AntiFlickerValue::Hz50);

    device.disconnected().unwrap();
    let state = anti_flicker(&device);
    assert_eq!(state.value, AntiFlickerValue::Unknown);
    assert_eq!(state.mode.value(), Some(&AntiFlickerMode::Hz50));
}

// ── Persistence ─────────────────────────────────────────────────────

#[test]
fn test_presets_and_cameras_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skyctl.json");

    {
        let (mut device, _rx) = device(Some(PersistentStore::open(&path).unwrap()));
        device.connecting().unwrap();
        device.dispatch(&Event::Camera(CameraEvent::Capabilities {
            cam_id: 0,
            model: CameraModel::Main.to_wire(),
            modes: 0b11,
            exposure_modes: 0,
            exposure_lock_supported: 0,
            exposure_roi_lock_supported: 0,
            ev_compensations: 0,
            white_balance_modes: 0,
            white_balance_temperatures: 0,
            white_balance_lock_supported: 0,
            styles: 0,
            hyperlapse_values: 0,
            bracketing_values: 0,
            burst_values: 0,
            metering_modes: 0,
            timelapse_interval_min: 1.0,
            gpslapse_interval_min: 1.0,
        }));
        device.connected().unwrap();
        device.camera_mut(0).unwrap().set_mode(CameraMode::Photo);
        device.disconnected().unwrap();
    }

    let store = PersistentStore::open(&path).unwrap();
    assert_eq!(
        store.preset_dictionary(UID).dictionary("camera0").get("mode"),
        Some(json!("PHOTO"))
    );

    let (mut device, _rx) = device(Some(store));
    assert_eq!(device.camera_ids(), vec![0]);
    let camera = device.camera_mut(0).unwrap();
    assert_eq!(camera.model(), CameraModel::Main);
    assert_eq!(camera.state().mode.value(), Some(&CameraMode::Photo));
}

#[test]
fn test_forget_drops_device_data() {
    let store = PersistentStore::in_memory();
    let (mut device, _rx) = device(Some(store.clone()));
    device.connecting().unwrap();
    device.dispatch(&Event::Camera(CameraEvent::AntiFlickerCapabilities { modes: 0b011 }));
    device.disconnected().unwrap();
    assert!(!store.device_dictionary(UID).is_new());

    device.forget().unwrap();
    assert!(store.device_dictionary(UID).is_new());
    assert!(device.components().get::<AntiFlickerState>(0).is_none());
}
