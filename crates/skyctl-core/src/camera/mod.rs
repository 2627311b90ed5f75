// ── Camera feature ──
//
// `CameraRouter` owns one `CameraController` per discovered camera id and
// routes camera events to it. Each controller publishes a `CameraState`
// snapshot under its camera id.

mod controller;
mod events;
mod presets;
mod router;

use crate::model::{
    BracketingValue, BurstValue, CameraMode, CameraModel, EvCompensation, ExposureLock,
    ExposureMode, Framerate, HyperlapseValue, IsoSensitivity, MeteringMode, PhotoFileFormat,
    PhotoFormat, PhotoMode, PhotoState, RecordingMode, RecordingState, Resolution, ShutterSpeed,
    Style, WhiteBalanceLock, WhiteBalanceMode, WhiteBalanceTemperature,
};
use crate::setting::{RangeSetting, Setting, Toggle};

pub use controller::CameraController;
pub use presets::{
    ExposureRequest, PhotoRequest, RecordingRequest, StyleParamsRequest, WhiteBalanceRequest,
};
pub use router::CameraRouter;

/// Published snapshot of one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    pub id: u8,
    pub model: CameraModel,
    /// Whether the device currently streams from this camera. Settings of
    /// an inactive camera can still be changed; actions cannot.
    pub active: bool,
    pub mode: Setting<CameraMode>,
    pub photo: PhotoSettings,
    pub recording: RecordingSettings,
    /// Empty domain while the exposure mode is manual or the exposure is
    /// locked.
    pub ev_compensation: Setting<EvCompensation>,
    pub exposure: ExposureSettings,
    pub exposure_lock: Option<ExposureLock>,
    pub white_balance: WhiteBalanceSettings,
    pub white_balance_lock: Option<WhiteBalanceLock>,
    pub style: StyleSettings,
    /// `None` until the device reports support.
    pub auto_hdr: Option<Toggle>,
    /// `None` until the device reports support.
    pub auto_record: Option<Toggle>,
    pub hdr_available: bool,
    pub hdr_active: bool,
    pub zoom: Option<ZoomState>,
    pub photo_state: PhotoState,
    pub recording_state: RecordingState,
}

impl CameraState {
    pub(crate) fn new(id: u8, model: CameraModel) -> Self {
        Self {
            id,
            model,
            active: false,
            mode: Setting::default(),
            photo: PhotoSettings::default(),
            recording: RecordingSettings::default(),
            ev_compensation: Setting::default(),
            exposure: ExposureSettings::default(),
            exposure_lock: None,
            white_balance: WhiteBalanceSettings::default(),
            white_balance_lock: None,
            style: StyleSettings::default(),
            auto_hdr: None,
            auto_record: None,
            hdr_available: false,
            hdr_active: false,
            zoom: None,
            photo_state: PhotoState::default(),
            recording_state: RecordingState::default(),
        }
    }

    pub(crate) fn cancel_rollbacks(&mut self) {
        self.mode.cancel_rollback();
        self.photo.cancel_rollbacks();
        self.recording.cancel_rollbacks();
        self.ev_compensation.cancel_rollback();
        self.exposure.cancel_rollbacks();
        self.white_balance.cancel_rollbacks();
        self.style.cancel_rollbacks();
        if let Some(toggle) = &mut self.auto_hdr {
            toggle.cancel_rollback();
        }
        if let Some(toggle) = &mut self.auto_record {
            toggle.cancel_rollback();
        }
        if let Some(zoom) = &mut self.zoom {
            zoom.max_speed.cancel_rollback();
            zoom.quality_degradation.cancel_rollback();
        }
        if let Some(lock) = &mut self.exposure_lock {
            lock.updating = false;
        }
        if let Some(lock) = &mut self.white_balance_lock {
            lock.updating = false;
        }
    }
}

/// Photo capture configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoSettings {
    pub mode: Setting<PhotoMode>,
    /// Domain depends on the photo mode.
    pub format: Setting<PhotoFormat>,
    /// Domain depends on the photo mode and format.
    pub file_format: Setting<PhotoFileFormat>,
    pub burst: Setting<BurstValue>,
    pub bracketing: Setting<BracketingValue>,
    /// Seconds between two time-lapse shots.
    pub timelapse_interval: RangeSetting<f64>,
    /// Meters between two GPS-lapse shots.
    pub gpslapse_interval: RangeSetting<f64>,
}

impl PhotoSettings {
    pub fn is_updating(&self) -> bool {
        self.mode.is_updating()
            || self.format.is_updating()
            || self.file_format.is_updating()
            || self.burst.is_updating()
            || self.bracketing.is_updating()
            || self.timelapse_interval.is_updating()
            || self.gpslapse_interval.is_updating()
    }

    fn cancel_rollbacks(&mut self) {
        self.mode.cancel_rollback();
        self.format.cancel_rollback();
        self.file_format.cancel_rollback();
        self.burst.cancel_rollback();
        self.bracketing.cancel_rollback();
        self.timelapse_interval.cancel_rollback();
        self.gpslapse_interval.cancel_rollback();
    }
}

/// Video recording configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSettings {
    pub mode: Setting<RecordingMode>,
    /// Domain depends on the recording mode.
    pub resolution: Setting<Resolution>,
    /// Domain depends on the recording mode and resolution.
    pub framerate: Setting<Framerate>,
    pub hyperlapse: Setting<HyperlapseValue>,
    /// Bits per second; zero while the camera is inactive.
    pub bitrate: u32,
}

impl RecordingSettings {
    pub fn is_updating(&self) -> bool {
        self.mode.is_updating()
            || self.resolution.is_updating()
            || self.framerate.is_updating()
            || self.hyperlapse.is_updating()
    }

    fn cancel_rollbacks(&mut self) {
        self.mode.cancel_rollback();
        self.resolution.cancel_rollback();
        self.framerate.cancel_rollback();
        self.hyperlapse.cancel_rollback();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposureSettings {
    pub mode: Setting<ExposureMode>,
    pub shutter_speed: Setting<ShutterSpeed>,
    pub iso: Setting<IsoSensitivity>,
    pub max_iso: Setting<IsoSensitivity>,
    pub metering_mode: Setting<MeteringMode>,
}

impl ExposureSettings {
    pub fn is_updating(&self) -> bool {
        self.mode.is_updating()
            || self.shutter_speed.is_updating()
            || self.iso.is_updating()
            || self.max_iso.is_updating()
            || self.metering_mode.is_updating()
    }

    fn cancel_rollbacks(&mut self) {
        self.mode.cancel_rollback();
        self.shutter_speed.cancel_rollback();
        self.iso.cancel_rollback();
        self.max_iso.cancel_rollback();
        self.metering_mode.cancel_rollback();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhiteBalanceSettings {
    pub mode: Setting<WhiteBalanceMode>,
    /// Only applies in `Custom` mode.
    pub temperature: Setting<WhiteBalanceTemperature>,
}

impl WhiteBalanceSettings {
    fn cancel_rollbacks(&mut self) {
        self.mode.cancel_rollback();
        self.temperature.cancel_rollback();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSettings {
    pub style: Setting<Style>,
    pub saturation: RangeSetting<i32>,
    pub contrast: RangeSetting<i32>,
    pub sharpness: RangeSetting<i32>,
}

impl StyleSettings {
    fn cancel_rollbacks(&mut self) {
        self.style.cancel_rollback();
        self.saturation.cancel_rollback();
        self.contrast.cancel_rollback();
        self.sharpness.cancel_rollback();
    }
}

/// Zoom capabilities and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomState {
    pub available: bool,
    /// Highest level reachable without quality loss.
    pub max_lossless_level: f64,
    pub max_lossy_level: f64,
    pub current_level: f64,
    /// Degrees per second.
    pub max_speed: RangeSetting<f64>,
    /// Whether velocity zoom may go past the lossless limit.
    pub quality_degradation: Toggle,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            available: false,
            max_lossless_level: 1.0,
            max_lossy_level: 1.0,
            current_level: 1.0,
            max_speed: RangeSetting::default(),
            quality_degradation: Toggle::default(),
        }
    }
}

impl ZoomState {
    /// Back to "no zoom" while keeping the configuration.
    pub(crate) fn reset(&mut self) {
        self.available = false;
        self.max_lossless_level = 1.0;
        self.max_lossy_level = 1.0;
        self.current_level = 1.0;
    }
}
