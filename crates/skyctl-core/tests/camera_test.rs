#![allow(clippy::unwrap_used)]
// Scenario tests for camera discovery, settings sync and lock negotiation.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use skyctl_core::camera::{CameraState, PhotoRequest};
use skyctl_core::command::CameraCommand;
use skyctl_core::event::CameraEvent;
use skyctl_core::model::{
    CameraMode, CameraModel, ExposureLockMode, PhotoFileFormat, PhotoFormat, PhotoMode,
    ZoomControlMode,
};
use skyctl_core::{
    Applied, Command, CommandQueue, ControllerConfig, Device, Event, PersistentStore,
};

// ── Helpers ─────────────────────────────────────────────────────────

const UID: &str = "drone-1";

fn device_with(
    store: Option<PersistentStore>,
    config: ControllerConfig,
) -> (Device, Arc<CommandQueue>, UnboundedReceiver<Command>) {
    let (queue, rx) = CommandQueue::new();
    let queue = Arc::new(queue);
    let device = Device::new(UID, queue.clone(), store, config);
    (device, queue, rx)
}

fn capabilities(cam_id: u8, model: u32) -> Event {
    Event::Camera(CameraEvent::Capabilities {
        cam_id,
        model,
        modes: 0b11,
        exposure_modes: 0,
        exposure_lock_supported: 1,
        exposure_roi_lock_supported: 1,
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
    })
}

fn camera_mode(cam_id: u8, mode: CameraMode) -> Event {
    Event::Camera(CameraEvent::CameraMode {
        cam_id,
        mode: mode.to_wire(),
    })
}

fn exposure_lock(center_x: f32, center_y: f32) -> Event {
    Event::Camera(CameraEvent::Exposure {
        cam_id: 0,
        lock: 1,
        center_x,
        center_y,
        width: 0.1,
        height: 0.1,
    })
}

fn drain(rx: &mut UnboundedReceiver<Command>) -> Vec<Command> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn camera_state(device: &Device, id: u8) -> Arc<CameraState> {
    device.components().get::<CameraState>(id).unwrap()
}

/// A single-entry photo capability list: single and time-lapse modes, both
/// formats, JPEG only.
fn photo_capabilities(cam_id: u8) -> Event {
    Event::Camera(CameraEvent::PhotoCapabilities {
        id: u16::from(cam_id) << 8,
        modes: 0b1001,
        formats: 0b11,
        file_formats: 0b1,
        hdr: 0,
        list_flags: 0b110,
    })
}

fn photo_modes_sent(commands: &[Command]) -> Vec<(PhotoMode, PhotoFormat)> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::Camera {
                command: CameraCommand::SetPhotoMode { mode, format, .. },
                ..
            } => Some((*mode, *format)),
            _ => None,
        })
        .collect()
}

/// Announces the main camera in recording mode and completes the
/// connection.
fn connect_main_camera(device: &mut Device) {
    device.connecting().unwrap();
    device.dispatch(&capabilities(0, CameraModel::Main.to_wire()));
    device.dispatch(&camera_mode(0, CameraMode::Recording));
    device.connected().unwrap();
}

// ── Settings sync ───────────────────────────────────────────────────

#[test]
fn test_set_mode_sends_once_and_confirmation_clears_updating() {
    let (mut device, _queue, mut rx) = device_with(None, ControllerConfig::default());
    connect_main_camera(&mut device);
    assert_eq!(drain(&mut rx), vec![], "preset replay matches the device");

    let camera = device.camera_mut(0).unwrap();
    assert_eq!(camera.set_mode(CameraMode::Photo), Applied::Sent);
    assert!(camera.state().mode.is_updating());
    assert_eq!(
        drain(&mut rx),
        vec![Command::Camera {
            cam_id: 0,
            command: CameraCommand::SetMode(CameraMode::Photo),
        }]
    );

    device.dispatch(&camera_mode(0, CameraMode::Photo));
    let state = camera_state(&device, 0);
    assert!(!state.mode.is_updating());
    assert_eq!(state.mode.value(), Some(&CameraMode::Photo));
}

#[test]
fn test_reapplying_confirmed_value_sends_nothing() {
    let (mut device, _queue, mut rx) = device_with(None, ControllerConfig::default());
    connect_main_camera(&mut device);

    let camera = device.camera_mut(0).unwrap();
    assert_eq!(camera.set_mode(CameraMode::Recording), Applied::Unchanged);
    assert!(!camera.state().mode.is_updating());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_preset_is_replayed_on_connect() {
    let store = PersistentStore::in_memory();
    store
        .preset_dictionary(UID)
        .dictionary("camera0")
        .put("mode", json!("PHOTO"));
    let (mut device, _queue, mut rx) = device_with(Some(store), ControllerConfig::default());

    connect_main_camera(&mut device);
    assert_eq!(
        drain(&mut rx),
        vec![Command::Camera {
            cam_id: 0,
            command: CameraCommand::SetMode(CameraMode::Photo),
        }]
    );
    assert!(camera_state(&device, 0).mode.is_updating());
}

#[test]
fn test_preset_replay_order_puts_mode_switch_after_other_mode_settings() {
    let store = PersistentStore::in_memory();
    store
        .preset_dictionary(UID)
        .dictionary("camera0")
        .put("autoHdr", json!(true))
        .put("photo", json!({ "mode": "SINGLE" }))
        .put("mode", json!("PHOTO"));
    let (mut device, _queue, mut rx) = device_with(Some(store), ControllerConfig::default());

    device.connecting().unwrap();
    device.dispatch(&capabilities(0, CameraModel::Main.to_wire()));
    device.dispatch(&Event::Camera(CameraEvent::HdrSetting { cam_id: 0, state: 0 }));
    device.dispatch(&photo_capabilities(0));
    device.dispatch(&camera_mode(0, CameraMode::Recording));
    device.connected().unwrap();

    let commands = drain(&mut rx);
    assert_eq!(commands.len(), 3, "{commands:?}");
    assert_eq!(
        commands[0],
        Command::Camera {
            cam_id: 0,
            command: CameraCommand::SetAutoHdr(true),
        }
    );
    assert_eq!(
        photo_modes_sent(&commands[1..2]),
        vec![(PhotoMode::Single, PhotoFormat::FullFrame)]
    );
    assert_eq!(
        commands[2],
        Command::Camera {
            cam_id: 0,
            command: CameraCommand::SetMode(CameraMode::Photo),
        }
    );
}

#[test]
fn test_photo_format_is_remembered_per_mode() {
    let store = PersistentStore::in_memory();
    {
        let (mut device, _queue, mut rx) = device_with(Some(store.clone()), ControllerConfig::default());
        connect_main_camera(&mut device);
        device.dispatch(&photo_capabilities(0));

        let camera = device.camera_mut(0).unwrap();
        let request = |mode, format| PhotoRequest {
            mode: Some(mode),
            format,
            ..PhotoRequest::default()
        };
        assert_eq!(camera.set_photo(request(PhotoMode::Single, Some(PhotoFormat::Rectilinear))), Applied::Sent);
        assert_eq!(camera.set_photo(request(PhotoMode::TimeLapse, Some(PhotoFormat::FullFrame))), Applied::Sent);
        assert_eq!(camera.set_photo(request(PhotoMode::Single, None)), Applied::Sent);
        assert_eq!(camera.state().photo.file_format.value(), Some(&PhotoFileFormat::Jpeg));

        assert_eq!(
            photo_modes_sent(&drain(&mut rx)),
            vec![
                (PhotoMode::Single, PhotoFormat::Rectilinear),
                (PhotoMode::TimeLapse, PhotoFormat::FullFrame),
                (PhotoMode::Single, PhotoFormat::Rectilinear),
            ]
        );
        device.disconnected().unwrap();
    }

    // The next session replays the format last used in the stored mode.
    let (mut device, _queue, mut rx) = device_with(Some(store), ControllerConfig::default());
    connect_main_camera(&mut device);
    assert_eq!(
        photo_modes_sent(&drain(&mut rx)),
        vec![(PhotoMode::Single, PhotoFormat::Rectilinear)]
    );
}

#[test]
fn test_settings_without_domain_are_dropped() {
    let (mut device, _queue, mut rx) = device_with(None, ControllerConfig::default());
    connect_main_camera(&mut device);

    let camera = device.camera_mut(0).unwrap();
    assert_eq!(camera.set_auto_hdr(true), Applied::Rejected);
    assert_eq!(camera.set_max_zoom_speed(5.0), Applied::Rejected);
    assert!(camera.state().zoom.is_none());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_state_events_before_connected_do_not_overwrite_visible_value() {
    let (mut device, _queue, _rx) = device_with(None, ControllerConfig::default());
    device.connecting().unwrap();
    device.dispatch(&capabilities(0, CameraModel::Main.to_wire()));
    device.dispatch(&camera_mode(0, CameraMode::Photo));

    let camera = device.camera_mut(0).unwrap();
    assert_eq!(camera.state().mode.confirmed(), Some(&CameraMode::Photo));
    assert_eq!(camera.state().mode.value(), None);
}

#[test]
fn test_hdr_event_with_unknown_state_changes_nothing() {
    let (mut device, _queue, _rx) = device_with(None, ControllerConfig::default());
    connect_main_camera(&mut device);

    device.dispatch(&Event::Camera(CameraEvent::Hdr {
        cam_id: 0,
        available: 1,
        state: 99,
    }));
    device.dispatch(&camera_mode(0, CameraMode::Photo));

    let state = camera_state(&device, 0);
    assert_eq!(state.mode.value(), Some(&CameraMode::Photo));
    assert!(!state.hdr_available);
    assert!(!state.hdr_active);
}

// ── Lock negotiation ────────────────────────────────────────────────

#[test]
fn test_lock_confirmation_must_match_the_request() {
    let (mut device, _queue, mut rx) = device_with(None, ControllerConfig::default());
    connect_main_camera(&mut device);

    let camera = device.camera_mut(0).unwrap();
    assert!(camera.lock_exposure(ExposureLockMode::Region, 0.5, 0.5));
    assert_eq!(
        drain(&mut rx),
        vec![Command::Camera {
            cam_id: 0,
            command: CameraCommand::LockExposureOnRegion {
                center_x: 0.5,
                center_y: 0.5,
            },
        }]
    );
    let requested = camera.state().exposure_lock.unwrap();
    assert!(requested.updating);

    device.dispatch(&exposure_lock(0.2, 0.2));
    assert_eq!(camera_state(&device, 0).exposure_lock, Some(requested));

    device.dispatch(&exposure_lock(0.5, 0.5));
    let lock = camera_state(&device, 0).exposure_lock.unwrap();
    assert_eq!(lock.mode, ExposureLockMode::Region);
    assert!(!lock.updating);
    assert!((lock.width - 0.1).abs() < 1e-6);
}

// ── Zoom ────────────────────────────────────────────────────────────

#[test]
fn test_zoom_control_goes_through_the_no_ack_channel() {
    let (mut device, queue, mut rx) = device_with(None, ControllerConfig::default());
    connect_main_camera(&mut device);
    device.dispatch(&Event::Camera(CameraEvent::ZoomInfo {
        cam_id: 0,
        available: 1,
        max_lossless_level: 2.0,
        max_lossy_level: 3.0,
    }));
    assert_eq!(queue.no_ack_count(), 1);

    device
        .camera_mut(0)
        .unwrap()
        .control_zoom(ZoomControlMode::Level, 8.0);
    assert_eq!(
        queue.poll_no_ack(),
        vec![Command::Camera {
            cam_id: 0,
            command: CameraCommand::SetZoomTarget {
                mode: ZoomControlMode::Level,
                target: 3.0,
            },
        }]
    );
    assert!(drain(&mut rx).is_empty(), "no-ack commands bypass the queue");

    device.disconnected().unwrap();
    assert_eq!(queue.no_ack_count(), 0);
}

// ── Router ──────────────────────────────────────────────────────────

#[test]
fn test_events_for_unknown_camera_are_dropped() {
    let (mut device, _queue, _rx) = device_with(None, ControllerConfig::default());
    device.connecting().unwrap();
    device.dispatch(&camera_mode(3, CameraMode::Photo));
    assert!(device.camera_ids().is_empty());
    assert!(device.components().published().is_empty());
}

#[test]
fn test_unknown_model_is_rejected() {
    let (mut device, _queue, _rx) = device_with(None, ControllerConfig::default());
    device.connecting().unwrap();
    device.dispatch(&capabilities(1, 42));
    assert!(device.camera_ids().is_empty());
}

#[test]
fn test_malformed_announcement_registers_nothing() {
    let store = PersistentStore::in_memory();
    let (mut device, _queue, _rx) = device_with(Some(store.clone()), ControllerConfig::default());
    device.connecting().unwrap();

    let mut announcement = capabilities(5, CameraModel::Main.to_wire());
    if let Event::Camera(CameraEvent::Capabilities {
        timelapse_interval_min,
        ..
    }) = &mut announcement
    {
        *timelapse_interval_min = f32::NAN;
    }
    device.dispatch(&announcement);

    assert!(device.camera_ids().is_empty());
    assert!(device.components().get::<CameraState>(5).is_none());
    assert!(store.device_dictionary(UID).dictionary("camera5").get("model").is_none());

    // A valid announcement afterwards still creates the camera.
    device.dispatch(&capabilities(5, CameraModel::Main.to_wire()));
    assert_eq!(device.camera_ids(), vec![5]);
}

#[test]
fn test_legacy_camera_key_restores_main_camera() {
    let store = PersistentStore::in_memory();
    store
        .device_dictionary(UID)
        .dictionary("camera")
        .put("supportedModes", json!(["PHOTO"]));
    store
        .device_dictionary(UID)
        .dictionary("camera1")
        .put("model", json!("THERMAL"));
    store
        .device_dictionary(UID)
        .dictionary("camera7")
        .put("supportedModes", json!(["PHOTO"]));

    let (mut device, _queue, _rx) = device_with(Some(store), ControllerConfig::default());
    assert_eq!(device.camera_ids(), vec![0, 1], "camera7 has no model");

    let main = camera_state(&device, 0);
    assert_eq!(main.model, CameraModel::Main);
    assert!(main.mode.supported().contains(&CameraMode::Photo));
    assert_eq!(device.camera_mut(1).unwrap().model(), CameraModel::Thermal);
}

#[test]
fn test_announced_camera_is_remembered() {
    let store = PersistentStore::in_memory();
    {
        let (mut device, _queue, _rx) = device_with(Some(store.clone()), ControllerConfig::default());
        device.connecting().unwrap();
        device.dispatch(&capabilities(2, CameraModel::ThermalBlended.to_wire()));
        device.disconnected().unwrap();
    }

    let (mut device, _queue, _rx) = device_with(Some(store), ControllerConfig::default());
    assert_eq!(device.camera_ids(), vec![2]);
    assert_eq!(device.camera_mut(2).unwrap().model(), CameraModel::ThermalBlended);
}

#[test]
fn test_main_camera_is_assumed_active_without_camera_states() {
    let (mut device, _queue, _rx) = device_with(None, ControllerConfig::default());
    connect_main_camera(&mut device);
    assert!(camera_state(&device, 0).active);

    let config = ControllerConfig {
        assume_main_camera_active: false,
        ..ControllerConfig::default()
    };
    let (mut device, _queue, _rx) = device_with(None, config);
    connect_main_camera(&mut device);
    assert!(!camera_state(&device, 0).active);
}

#[test]
fn test_camera_states_bitmask_drives_activation() {
    let (mut device, _queue, _rx) = device_with(None, ControllerConfig::default());
    device.connecting().unwrap();
    device.dispatch(&capabilities(0, CameraModel::Main.to_wire()));
    device.dispatch(&capabilities(1, CameraModel::Thermal.to_wire()));
    device.dispatch(&Event::Camera(CameraEvent::CameraStates {
        active_cameras: 0b10,
    }));
    device.connected().unwrap();

    assert!(!camera_state(&device, 0).active);
    assert!(camera_state(&device, 1).active);

    device.dispatch(&Event::Camera(CameraEvent::CameraStates {
        active_cameras: 0b01,
    }));
    assert!(camera_state(&device, 0).active);
    assert!(!camera_state(&device, 1).active);
}

#[test]
fn test_streamed_photo_capabilities_set_the_photo_mode_domain() {
    let (mut device, _queue, _rx) = device_with(None, ControllerConfig::default());
    connect_main_camera(&mut device);

    let entry = |index: u16, modes: u64, list_flags: u8| {
        Event::Camera(CameraEvent::PhotoCapabilities {
            id: index,
            modes,
            formats: 0b1,
            file_formats: 0b1,
            hdr: 0,
            list_flags,
        })
    };
    device.dispatch(&entry(0, 0b001, 0b010));
    assert!(camera_state(&device, 0).photo.mode.supported().is_empty());

    device.dispatch(&entry(1, 0b100, 0b100));
    assert_eq!(camera_state(&device, 0).photo.mode.supported().len(), 2);
}
