// ── Camera controller ──
//
// Owns one camera's `CameraState`: setters and preset replays go through
// the Setting engine, inbound events (see `events.rs`) confirm values and
// refresh domains. Every mutation ends in a single `notify` so observers
// see one snapshot per operation.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::presets::{
    self, ExposureRequest, ModeFormats, PhotoRequest, RecordingRequest, StyleParamsRequest,
    WhiteBalanceRequest,
};
use super::{CameraState, ZoomState};
use crate::command::{CameraCommand, Command, NoAckEncoder, ZoomControlEncoder};
use crate::component::Component;
use crate::device::DeviceContext;
use crate::model::camera::{
    framerates, photo_file_formats, photo_formats, photo_modes, recording_modes, resolutions,
};
use crate::model::{
    CameraMode, CameraModel, EvCompensation, ExposureLock, ExposureLockMode, ExposureMode,
    PhotoCapability, PhotoFunctionState, PhotoMode, RecordingCapability, RecordingFunctionState,
    RecordingMode, Style, WhiteBalanceLock, WhiteBalanceMode, ZoomControlMode,
};
use crate::setting::{Applied, Bounds, Domain, Setting, Toggle};
use crate::store::Dictionary;

/// Tolerance when matching a region lock confirmation to its request.
const LOCK_CENTER_TOLERANCE: f64 = 1e-3;

/// An exposure lock sent but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct LockRequest {
    pub(super) mode: ExposureLockMode,
    pub(super) center_x: f64,
    pub(super) center_y: f64,
}

impl LockRequest {
    /// Whether `lock` confirms this request.
    pub(super) fn is_confirmed_by(&self, lock: &ExposureLock) -> bool {
        if self.mode != lock.mode {
            return false;
        }
        self.mode != ExposureLockMode::Region
            || ((self.center_x - lock.center_x).abs() <= LOCK_CENTER_TOLERANCE
                && (self.center_y - lock.center_y).abs() <= LOCK_CENTER_TOLERANCE)
    }
}

/// Capability lists that derive several domains at once.
#[derive(Debug, Default)]
pub(super) struct Capabilities {
    pub(super) photo: Vec<PhotoCapability>,
    pub(super) recording: Vec<RecordingCapability>,
    pub(super) ev_compensations: BTreeSet<EvCompensation>,
}

/// Controller for one camera instance.
pub struct CameraController {
    pub(super) context: Arc<DeviceContext>,
    settings_key: String,
    pub(super) state: CameraState,
    component: Component<CameraState>,
    pub(super) device_dict: Option<Dictionary>,
    presets: Option<Dictionary>,
    pub(super) connected: bool,
    /// Last activation reported by the device, applied once connected.
    active: bool,
    pub(super) caps: Capabilities,
    pub(super) mode_formats: ModeFormats,
    /// Bitrate reported while active, restored on reactivation.
    pub(super) recording_bitrate: u32,
    pub(super) pending_lock: Option<LockRequest>,
    zoom_encoder: Arc<ZoomControlEncoder>,
}

impl CameraController {
    pub(crate) fn new(
        context: Arc<DeviceContext>,
        id: u8,
        model: CameraModel,
        settings_key: String,
    ) -> Self {
        let device_dict = context.device_dictionary(&settings_key);
        let presets = context.preset_dictionary(&settings_key);
        let component = Component::new(Arc::clone(context.components()), id);
        let zoom_encoder = Arc::new(ZoomControlEncoder::new(
            id,
            context.config().zoom_repeat_bound,
        ));

        let mut controller = Self {
            context,
            settings_key,
            state: CameraState::new(id, model),
            component,
            device_dict,
            presets,
            connected: false,
            active: false,
            caps: Capabilities::default(),
            mode_formats: ModeFormats::default(),
            recording_bitrate: 0,
            pending_lock: None,
            zoom_encoder,
        };
        controller.load_persisted();

        if controller.device_dict.as_ref().is_some_and(|dict| !dict.is_new()) {
            controller.component.publish(controller.state.clone());
        }
        info!(camera = id, %model, key = %controller.settings_key, "camera controller created");
        controller
    }

    pub fn id(&self) -> u8 {
        self.state.id
    }

    pub fn model(&self) -> CameraModel {
        self.state.model
    }

    /// Current snapshot, published or not.
    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub(super) fn settings_key(&self) -> &str {
        &self.settings_key
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub(crate) fn on_connected(&mut self) {
        self.connected = true;
        self.apply_presets();
        self.on_activation_state(self.active);
    }

    pub(crate) fn on_disconnected(&mut self) {
        self.state.cancel_rollbacks();
        self.on_activation_state(false);
        self.connected = false;
    }

    pub(crate) fn on_forgetting(&mut self) {
        if let Some(dict) = &self.device_dict {
            dict.clear();
            if let Err(err) = dict.commit() {
                warn!(camera = self.id(), error = %err, "failed to commit cleared camera data");
            }
        }
        self.component.unpublish();
    }

    pub(crate) fn on_preset_change(&mut self) {
        self.presets = self.context.preset_dictionary(&self.settings_key);
        if self.connected {
            self.apply_presets();
            self.notify();
        }
    }

    /// Applies activation now if connected; otherwise remembers it for
    /// `on_connected`.
    pub(crate) fn on_activation_state(&mut self, active: bool) {
        self.active = active;
        if !self.connected {
            return;
        }

        let encoder: Arc<dyn NoAckEncoder> = self.zoom_encoder.clone();
        if active {
            self.context.channel().register_no_ack(encoder);
            self.state.recording.bitrate = self.recording_bitrate;
        } else {
            self.context.channel().unregister_no_ack(&encoder);
            self.zoom_encoder.reset();
            if let Some(zoom) = &mut self.state.zoom {
                zoom.reset();
            }
            self.pending_lock = None;
            self.state.recording.bitrate = 0;
            self.state.photo_state.function_state = PhotoFunctionState::Unavailable;
            self.state.recording_state.function_state = RecordingFunctionState::Unavailable;
        }

        debug!(camera = self.id(), active, "camera activation");
        self.state.active = active;
        self.component.publish(self.state.clone());
    }

    pub(super) fn notify(&self) {
        self.component.notify_updated(self.state.clone());
    }

    // ── Persisted data ───────────────────────────────────────────────

    fn load_persisted(&mut self) {
        let dict = self.device_dict.clone();
        let dict = dict.as_ref();
        let state = &mut self.state;

        if let Some(modes) = presets::SUPPORTED_MODES.load(dict) {
            state.mode.set_domain(modes);
        }

        if let Some(caps) = presets::PHOTO_CAPABILITIES.load(dict) {
            state.photo.mode.set_domain(photo_modes(&caps));
            self.caps.photo = caps;
        }
        if let Some(values) = presets::BURST_VALUES.load(dict) {
            state.photo.burst.set_domain(values);
        }
        if let Some(values) = presets::BRACKETING_VALUES.load(dict) {
            state.photo.bracketing.set_domain(values);
        }
        if let Some(range) = presets::TIMELAPSE_RANGE.load(dict) {
            state.photo.timelapse_interval.set_domain(Some(range));
        }
        if let Some(range) = presets::GPSLAPSE_RANGE.load(dict) {
            state.photo.gpslapse_interval.set_domain(Some(range));
        }

        if let Some(caps) = presets::RECORDING_CAPABILITIES.load(dict) {
            state.recording.mode.set_domain(recording_modes(&caps));
            self.caps.recording = caps;
        }
        if let Some(values) = presets::HYPERLAPSE_VALUES.load(dict) {
            state.recording.hyperlapse.set_domain(values);
        }

        if let Some(values) = presets::EV_COMPENSATIONS.load(dict) {
            self.caps.ev_compensations = values;
        }
        if let Some(modes) = presets::EXPOSURE_MODES.load(dict) {
            state.exposure.mode.set_domain(modes);
        }
        if let Some(values) = presets::SHUTTER_SPEEDS.load(dict) {
            state.exposure.shutter_speed.set_domain(values);
        }
        if let Some(values) = presets::ISOS.load(dict) {
            state.exposure.iso.set_domain(values);
        }
        if let Some(values) = presets::MAX_ISOS.load(dict) {
            state.exposure.max_iso.set_domain(values);
        }
        if let Some(modes) = presets::METERING_MODES.load(dict) {
            state.exposure.metering_mode.set_domain(modes);
        }
        if presets::EXPOSURE_LOCK_SUPPORTED.load(dict) == Some(true) {
            state.exposure_lock.get_or_insert_with(ExposureLock::default);
        }

        if let Some(modes) = presets::WHITE_BALANCE_MODES.load(dict) {
            state.white_balance.mode.set_domain(modes);
        }
        if let Some(values) = presets::WHITE_BALANCE_TEMPERATURES.load(dict) {
            state.white_balance.temperature.set_domain(values);
        }
        if presets::WHITE_BALANCE_LOCK_SUPPORTED.load(dict) == Some(true) {
            state.white_balance_lock.get_or_insert_with(WhiteBalanceLock::default);
        }

        if let Some(styles) = presets::STYLES.load(dict) {
            state.style.style.set_domain(styles);
        }
        if let Some(range) = presets::SATURATION_RANGE.load(dict) {
            state.style.saturation.set_domain(Some(range));
        }
        if let Some(range) = presets::CONTRAST_RANGE.load(dict) {
            state.style.contrast.set_domain(Some(range));
        }
        if let Some(range) = presets::SHARPNESS_RANGE.load(dict) {
            state.style.sharpness.set_domain(Some(range));
        }

        if presets::AUTO_RECORD_SUPPORTED.load(dict) == Some(true) {
            state.auto_record.get_or_insert_with(Toggle::default);
        }
        if presets::AUTO_HDR_SUPPORTED.load(dict) == Some(true) {
            state.auto_hdr.get_or_insert_with(Toggle::default);
        }
        if let Some(range) = presets::MAX_ZOOM_SPEED_RANGE.load(dict) {
            state
                .zoom
                .get_or_insert_with(ZoomState::default)
                .max_speed
                .set_domain(Some(range));
        }

        self.refresh_ev_domain();
        self.apply_presets();
    }

    // ── Preset replay ────────────────────────────────────────────────

    /// Replays the stored presets. Settings for the mode the camera is not
    /// in go first, so the mode switch reconfigures the pipeline once.
    pub(super) fn apply_presets(&mut self) {
        let dict = self.presets.clone();
        let dict = dict.as_ref();

        self.apply_auto_hdr(presets::AUTO_HDR.load(dict));

        if let Some(stored) = presets::MODE_FORMATS.load(dict) {
            self.mode_formats.extend(stored);
        }
        let before_switch = self.state.mode.confirmed().copied();
        let photo = presets::PHOTO.load(dict).unwrap_or_default();
        let recording = presets::RECORDING.load(dict).unwrap_or_default();

        if before_switch != Some(CameraMode::Photo) {
            self.apply_photo(photo);
        }
        if before_switch != Some(CameraMode::Recording) {
            self.apply_recording(recording);
        }

        self.apply_mode(presets::MODE.load(dict));

        match before_switch {
            Some(CameraMode::Photo) => {
                self.apply_photo(photo);
            }
            Some(CameraMode::Recording) => {
                self.apply_recording(recording);
            }
            None => {}
        }

        self.apply_ev_compensation(presets::EV_COMPENSATION.load(dict));
        self.apply_exposure(presets::EXPOSURE.load(dict).unwrap_or_default());
        self.apply_white_balance(presets::WHITE_BALANCE.load(dict).unwrap_or_default());
        self.apply_style(presets::STYLE.load(dict));
        self.apply_style_params(presets::STYLE_PARAMS.load(dict).unwrap_or_default());
        self.apply_auto_record(presets::AUTO_RECORD.load(dict));
        self.apply_max_zoom_speed(presets::MAX_ZOOM_SPEED.load(dict));
        self.apply_zoom_quality_degradation(presets::ZOOM_QUALITY_DEGRADATION.load(dict));
    }

    // ── Setters ──────────────────────────────────────────────────────

    /// Switches between photo and recording.
    pub fn set_mode(&mut self, mode: CameraMode) -> Applied {
        presets::MODE.save(self.presets.as_ref(), &mode);
        let applied = self.apply_mode(Some(mode));
        self.notify();
        applied
    }

    /// Changes the photo configuration. Absent fields keep their previous
    /// value, except formats, which default to the ones last used in the
    /// requested mode. Fields the photo mode ignores are carried over
    /// unchecked.
    pub fn set_photo(&mut self, request: PhotoRequest) -> Applied {
        self.save_request(&presets::PHOTO, request, |stored: PhotoRequest, newer| PhotoRequest {
            format: None,
            file_format: None,
            ..stored.overlay(newer)
        });
        let applied = self.apply_photo(request);
        presets::MODE_FORMATS.save(self.presets.as_ref(), &self.mode_formats);
        self.notify();
        applied
    }

    pub fn set_recording(&mut self, request: RecordingRequest) -> Applied {
        self.save_request(&presets::RECORDING, request, |stored: RecordingRequest, newer| RecordingRequest {
            resolution: None,
            framerate: None,
            ..stored.overlay(newer)
        });
        let applied = self.apply_recording(request);
        presets::MODE_FORMATS.save(self.presets.as_ref(), &self.mode_formats);
        self.notify();
        applied
    }

    pub fn set_ev_compensation(&mut self, value: EvCompensation) -> Applied {
        presets::EV_COMPENSATION.save(self.presets.as_ref(), &value);
        let applied = self.apply_ev_compensation(Some(value));
        self.notify();
        applied
    }

    pub fn set_exposure(&mut self, request: ExposureRequest) -> Applied {
        self.save_request(&presets::EXPOSURE, request, ExposureRequest::overlay);
        let applied = self.apply_exposure(request);
        self.refresh_ev_domain();
        self.notify();
        applied
    }

    pub fn set_white_balance(&mut self, request: WhiteBalanceRequest) -> Applied {
        self.save_request(&presets::WHITE_BALANCE, request, WhiteBalanceRequest::overlay);
        let applied = self.apply_white_balance(request);
        self.notify();
        applied
    }

    pub fn set_style(&mut self, style: Style) -> Applied {
        presets::STYLE.save(self.presets.as_ref(), &style);
        let applied = self.apply_style(Some(style));
        self.notify();
        applied
    }

    pub fn set_style_params(&mut self, request: StyleParamsRequest) -> Applied {
        self.save_request(&presets::STYLE_PARAMS, request, StyleParamsRequest::overlay);
        let applied = self.apply_style_params(request);
        self.notify();
        applied
    }

    pub fn set_auto_hdr(&mut self, enabled: bool) -> Applied {
        presets::AUTO_HDR.save(self.presets.as_ref(), &enabled);
        let applied = self.apply_auto_hdr(Some(enabled));
        self.notify();
        applied
    }

    pub fn set_auto_record(&mut self, enabled: bool) -> Applied {
        presets::AUTO_RECORD.save(self.presets.as_ref(), &enabled);
        let applied = self.apply_auto_record(Some(enabled));
        self.notify();
        applied
    }

    pub fn set_max_zoom_speed(&mut self, speed: f64) -> Applied {
        presets::MAX_ZOOM_SPEED.save(self.presets.as_ref(), &speed);
        let applied = self.apply_max_zoom_speed(Some(speed));
        self.notify();
        applied
    }

    pub fn set_zoom_quality_degradation(&mut self, allowed: bool) -> Applied {
        presets::ZOOM_QUALITY_DEGRADATION.save(self.presets.as_ref(), &allowed);
        let applied = self.apply_zoom_quality_degradation(Some(allowed));
        self.notify();
        applied
    }

    fn save_request<R>(
        &self,
        entry: &crate::store::StorageEntry<R>,
        request: R,
        overlay: fn(R, R) -> R,
    ) where
        R: serde::Serialize + serde::de::DeserializeOwned + Default,
    {
        let dict = self.presets.as_ref();
        let stored = entry.load(dict).unwrap_or_default();
        entry.save(dict, &overlay(stored, request));
    }

    // ── Apply routines ───────────────────────────────────────────────

    fn send(&self, command: CameraCommand) -> bool {
        self.context.send(Command::Camera {
            cam_id: self.state.id,
            command,
        })
    }

    fn apply_mode(&mut self, mode: Option<CameraMode>) -> Applied {
        let context = &self.context;
        let id = self.state.id;
        let applied = self.state.mode.apply(mode, |mode| {
            context.send(Command::Camera {
                cam_id: id,
                command: CameraCommand::SetMode(*mode),
            })
        });
        log_applied(id, "mode", applied);
        applied
    }

    fn apply_photo(&mut self, request: PhotoRequest) -> Applied {
        let caps = &self.caps.photo;
        let remembered = &self.mode_formats;
        let photo = &mut self.state.photo;

        let Some(mode) = photo.mode.resolve(request.mode) else {
            return log_applied(self.state.id, "photo mode", Applied::Rejected);
        };
        photo.format.set_domain(photo_formats(caps, mode));
        let format = request.format.or_else(|| remembered.photo_formats.get(&mode).copied());
        let Some(format) = photo.format.supported().fit(format) else {
            return log_applied(self.state.id, "photo format", Applied::Rejected);
        };
        photo.file_format.set_domain(photo_file_formats(caps, mode, format));
        let file_format = request
            .file_format
            .or_else(|| remembered.photo_file_formats.get(&mode).copied());
        let Some(file_format) = photo.file_format.supported().fit(file_format) else {
            return log_applied(self.state.id, "photo file format", Applied::Rejected);
        };

        let burst = pick(&photo.burst, request.burst, mode == PhotoMode::Burst);
        let bracketing = pick(&photo.bracketing, request.bracketing, mode == PhotoMode::Bracketing);
        let (Some(burst), Some(bracketing)) = (burst, bracketing) else {
            return log_applied(self.state.id, "photo burst/bracketing", Applied::Rejected);
        };
        let timelapse = photo
            .timelapse_interval
            .resolve(request.timelapse_interval)
            .or_else(|| photo.timelapse_interval.fallback(request.timelapse_interval))
            .unwrap_or_default();
        let gpslapse = photo
            .gpslapse_interval
            .resolve(request.gpslapse_interval)
            .or_else(|| photo.gpslapse_interval.fallback(request.gpslapse_interval))
            .unwrap_or_default();

        let must_send = photo.mode.differs(&mode)
            || photo.format.differs(&format)
            || photo.file_format.differs(&file_format)
            || match mode {
                PhotoMode::Single => false,
                PhotoMode::Burst => photo.burst.differs(&burst),
                PhotoMode::Bracketing => photo.bracketing.differs(&bracketing),
                PhotoMode::TimeLapse => photo.timelapse_interval.differs(&timelapse),
                PhotoMode::GpsLapse => photo.gpslapse_interval.differs(&gpslapse),
            };
        let capture_interval = if mode == PhotoMode::GpsLapse {
            gpslapse
        } else {
            timelapse
        };
        let sent = must_send
            && self.send(CameraCommand::SetPhotoMode {
                mode,
                format,
                file_format,
                burst,
                bracketing,
                capture_interval,
            });

        let photo = &mut self.state.photo;
        photo.mode.commit(mode, sent);
        photo.format.commit(format, sent);
        photo.file_format.commit(file_format, sent);
        photo.burst.commit(burst, sent && mode == PhotoMode::Burst);
        photo.bracketing.commit(bracketing, sent && mode == PhotoMode::Bracketing);
        photo.timelapse_interval.commit(timelapse, sent && mode == PhotoMode::TimeLapse);
        photo.gpslapse_interval.commit(gpslapse, sent && mode == PhotoMode::GpsLapse);
        self.mode_formats.remember_photo(mode, format, file_format);
        log_applied(self.state.id, "photo", outcome(sent))
    }

    fn apply_recording(&mut self, request: RecordingRequest) -> Applied {
        let caps = &self.caps.recording;
        let remembered = &self.mode_formats;
        let recording = &mut self.state.recording;

        let Some(mode) = recording.mode.resolve(request.mode) else {
            return log_applied(self.state.id, "recording mode", Applied::Rejected);
        };
        recording.resolution.set_domain(resolutions(caps, mode));
        let resolution = request.resolution.or_else(|| remembered.resolutions.get(&mode).copied());
        let Some(resolution) = recording.resolution.supported().fit(resolution) else {
            return log_applied(self.state.id, "resolution", Applied::Rejected);
        };
        recording.framerate.set_domain(framerates(caps, mode, resolution));
        let framerate = request.framerate.or_else(|| remembered.framerates.get(&mode).copied());
        let Some(framerate) = recording.framerate.supported().fit(framerate) else {
            return log_applied(self.state.id, "framerate", Applied::Rejected);
        };
        let hyperlapse = if mode == RecordingMode::Hyperlapse {
            recording.hyperlapse.resolve(request.hyperlapse)
        } else {
            Some(recording.hyperlapse.fallback(request.hyperlapse).unwrap_or_default())
        };
        let Some(hyperlapse) = hyperlapse else {
            return log_applied(self.state.id, "hyperlapse", Applied::Rejected);
        };

        let must_send = recording.mode.differs(&mode)
            || recording.resolution.differs(&resolution)
            || recording.framerate.differs(&framerate)
            || (mode == RecordingMode::Hyperlapse && recording.hyperlapse.differs(&hyperlapse));
        let sent = must_send
            && self.send(CameraCommand::SetRecordingMode {
                mode,
                resolution,
                framerate,
                hyperlapse,
            });

        let recording = &mut self.state.recording;
        recording.mode.commit(mode, sent);
        recording.resolution.commit(resolution, sent);
        recording.framerate.commit(framerate, sent);
        recording
            .hyperlapse
            .commit(hyperlapse, sent && mode == RecordingMode::Hyperlapse);
        self.mode_formats.remember_recording(mode, resolution, framerate);
        log_applied(self.state.id, "recording", outcome(sent))
    }

    fn apply_ev_compensation(&mut self, value: Option<EvCompensation>) -> Applied {
        let context = &self.context;
        let id = self.state.id;
        let applied = self.state.ev_compensation.apply(value, |value| {
            context.send(Command::Camera {
                cam_id: id,
                command: CameraCommand::SetEvCompensation(*value),
            })
        });
        log_applied(id, "EV compensation", applied)
    }

    fn apply_exposure(&mut self, request: ExposureRequest) -> Applied {
        let exposure = &mut self.state.exposure;

        let Some(mode) = exposure.mode.resolve(request.mode) else {
            return log_applied(self.state.id, "exposure mode", Applied::Rejected);
        };
        let shutter_speed = pick(&exposure.shutter_speed, request.shutter_speed, mode.uses_shutter_speed());
        let iso = pick(&exposure.iso, request.iso, mode.uses_iso());
        let max_iso = pick(&exposure.max_iso, request.max_iso, mode.is_automatic());
        let metering_mode = pick(&exposure.metering_mode, request.metering_mode, mode.is_automatic());
        let (Some(shutter_speed), Some(iso), Some(max_iso), Some(metering_mode)) =
            (shutter_speed, iso, max_iso, metering_mode)
        else {
            return log_applied(self.state.id, "exposure", Applied::Rejected);
        };

        let must_send = exposure.mode.differs(&mode)
            || (mode.uses_shutter_speed() && exposure.shutter_speed.differs(&shutter_speed))
            || (mode.uses_iso() && exposure.iso.differs(&iso))
            || (mode.is_automatic()
                && (exposure.max_iso.differs(&max_iso)
                    || exposure.metering_mode.differs(&metering_mode)));
        let sent = must_send
            && self.send(CameraCommand::SetExposureSettings {
                mode,
                shutter_speed,
                iso,
                max_iso,
                metering_mode,
            });

        let exposure = &mut self.state.exposure;
        exposure.mode.commit(mode, sent);
        exposure
            .shutter_speed
            .commit(shutter_speed, sent && mode.uses_shutter_speed());
        exposure.iso.commit(iso, sent && mode.uses_iso());
        exposure.max_iso.commit(max_iso, sent && mode.is_automatic());
        exposure
            .metering_mode
            .commit(metering_mode, sent && mode.is_automatic());
        log_applied(self.state.id, "exposure", outcome(sent))
    }

    fn apply_white_balance(&mut self, request: WhiteBalanceRequest) -> Applied {
        let white_balance = &mut self.state.white_balance;

        let Some(mode) = white_balance.mode.resolve(request.mode) else {
            return log_applied(self.state.id, "white balance mode", Applied::Rejected);
        };
        let custom = mode == WhiteBalanceMode::Custom;
        let Some(temperature) = pick(&white_balance.temperature, request.temperature, custom) else {
            return log_applied(self.state.id, "white balance temperature", Applied::Rejected);
        };

        let must_send =
            white_balance.mode.differs(&mode) || (custom && white_balance.temperature.differs(&temperature));
        let sent = must_send && self.send(CameraCommand::SetWhiteBalance { mode, temperature });

        let white_balance = &mut self.state.white_balance;
        white_balance.mode.commit(mode, sent);
        white_balance.temperature.commit(temperature, sent && custom);
        if let Some(lock) = &mut self.state.white_balance_lock {
            lock.lockable = mode == WhiteBalanceMode::Automatic;
        }
        log_applied(self.state.id, "white balance", outcome(sent))
    }

    fn apply_style(&mut self, style: Option<Style>) -> Applied {
        let context = &self.context;
        let id = self.state.id;
        let applied = self.state.style.style.apply(style, |style| {
            context.send(Command::Camera {
                cam_id: id,
                command: CameraCommand::SetStyle(*style),
            })
        });
        log_applied(id, "style", applied)
    }

    fn apply_style_params(&mut self, request: StyleParamsRequest) -> Applied {
        let style = &self.state.style;
        let (Some(saturation), Some(contrast), Some(sharpness)) = (
            style.saturation.resolve(request.saturation),
            style.contrast.resolve(request.contrast),
            style.sharpness.resolve(request.sharpness),
        ) else {
            return log_applied(self.state.id, "style parameters", Applied::Rejected);
        };

        let must_send = style.saturation.differs(&saturation)
            || style.contrast.differs(&contrast)
            || style.sharpness.differs(&sharpness);
        let sent = must_send
            && self.send(CameraCommand::SetStyleParams {
                saturation,
                contrast,
                sharpness,
            });

        let style = &mut self.state.style;
        style.saturation.commit(saturation, sent);
        style.contrast.commit(contrast, sent);
        style.sharpness.commit(sharpness, sent);
        log_applied(self.state.id, "style parameters", outcome(sent))
    }

    fn apply_auto_hdr(&mut self, enabled: Option<bool>) -> Applied {
        let context = &self.context;
        let id = self.state.id;
        let Some(toggle) = &mut self.state.auto_hdr else {
            return log_applied(id, "auto-HDR", Applied::Rejected);
        };
        let applied = toggle.apply(enabled, |enabled| {
            context.send(Command::Camera {
                cam_id: id,
                command: CameraCommand::SetAutoHdr(*enabled),
            })
        });
        log_applied(id, "auto-HDR", applied)
    }

    fn apply_auto_record(&mut self, enabled: Option<bool>) -> Applied {
        let context = &self.context;
        let id = self.state.id;
        let Some(toggle) = &mut self.state.auto_record else {
            return log_applied(id, "auto-record", Applied::Rejected);
        };
        let applied = toggle.apply(enabled, |enabled| {
            context.send(Command::Camera {
                cam_id: id,
                command: CameraCommand::SetAutoRecord(*enabled),
            })
        });
        log_applied(id, "auto-record", applied)
    }

    fn apply_max_zoom_speed(&mut self, speed: Option<f64>) -> Applied {
        let context = &self.context;
        let id = self.state.id;
        let Some(zoom) = &mut self.state.zoom else {
            return log_applied(id, "max zoom speed", Applied::Rejected);
        };
        let applied = zoom.max_speed.apply(speed, |speed| {
            context.send(Command::Camera {
                cam_id: id,
                command: CameraCommand::SetMaxZoomSpeed(*speed),
            })
        });
        log_applied(id, "max zoom speed", applied)
    }

    fn apply_zoom_quality_degradation(&mut self, allowed: Option<bool>) -> Applied {
        let context = &self.context;
        let id = self.state.id;
        let Some(zoom) = &mut self.state.zoom else {
            return log_applied(id, "zoom quality degradation", Applied::Rejected);
        };
        let applied = zoom.quality_degradation.apply(allowed, |allowed| {
            context.send(Command::Camera {
                cam_id: id,
                command: CameraCommand::SetZoomVelocityQualityDegradation(*allowed),
            })
        });
        log_applied(id, "zoom quality degradation", applied)
    }

    /// EV compensation is meaningless in manual exposure or under a lock.
    pub(super) fn refresh_ev_domain(&mut self) {
        let manual = self.state.exposure.mode.value() == Some(&ExposureMode::Manual);
        let locked = self
            .state
            .exposure_lock
            .is_some_and(|lock| lock.mode != ExposureLockMode::None);
        let domain = if manual || locked {
            BTreeSet::new()
        } else {
            self.caps.ev_compensations.clone()
        };
        self.state.ev_compensation.set_domain(domain);
    }

    // ── Exposure lock ────────────────────────────────────────────────

    /// Requests an exposure lock. `center_x`/`center_y` are relative image
    /// coordinates, only used in `Region` mode. Returns `true` if the
    /// command went out.
    pub fn lock_exposure(&mut self, mode: ExposureLockMode, center_x: f64, center_y: f64) -> bool {
        if self.state.exposure_lock.is_none() {
            debug!(camera = self.id(), "exposure lock unsupported");
            return false;
        }
        self.pending_lock = Some(LockRequest {
            mode,
            center_x,
            center_y,
        });
        let command = match mode {
            ExposureLockMode::None => CameraCommand::UnlockExposure,
            ExposureLockMode::CurrentValues => CameraCommand::LockExposure,
            ExposureLockMode::Region => CameraCommand::LockExposureOnRegion { center_x, center_y },
        };
        let sent = self.state.active && self.send(command);
        if sent {
            if let Some(lock) = &mut self.state.exposure_lock {
                lock.mode = mode;
                if mode == ExposureLockMode::Region {
                    lock.center_x = center_x;
                    lock.center_y = center_y;
                }
                lock.updating = true;
            }
            self.notify();
        }
        sent
    }

    /// Locks or unlocks the automatic white balance.
    pub fn lock_white_balance(&mut self, locked: bool) -> bool {
        let Some(lock) = self.state.white_balance_lock else {
            return false;
        };
        if !lock.lockable || lock.locked == locked {
            return false;
        }
        let sent = self.state.active && self.send(CameraCommand::SetWhiteBalanceLock(locked));
        if sent {
            if let Some(lock) = &mut self.state.white_balance_lock {
                lock.locked = locked;
                lock.updating = true;
            }
            self.notify();
        }
        sent
    }

    // ── Actions ──────────────────────────────────────────────────────

    pub fn start_photo_capture(&mut self) -> bool {
        self.action(CameraCommand::TakePhoto)
    }

    pub fn stop_photo_capture(&mut self) -> bool {
        self.action(CameraCommand::StopPhoto)
    }

    pub fn start_recording(&mut self) -> bool {
        self.action(CameraCommand::StartRecording)
    }

    pub fn stop_recording(&mut self) -> bool {
        self.action(CameraCommand::StopRecording)
    }

    fn action(&self, command: CameraCommand) -> bool {
        if !self.state.active {
            debug!(camera = self.id(), ?command, "camera inactive, action ignored");
            return false;
        }
        self.send(command)
    }

    /// Drives the zoom. Levels are clamped to `[1, max_lossy_level]`,
    /// velocities to `[-1, 1]`. Ignored while the camera is inactive.
    pub fn control_zoom(&mut self, mode: ZoomControlMode, target: f64) {
        if !self.state.active {
            return;
        }
        let target = match mode {
            ZoomControlMode::Level => {
                let max = self.state.zoom.as_ref().map_or(1.0, |zoom| zoom.max_lossy_level);
                Bounds::new(1.0, max.max(1.0)).map_or(1.0, |bounds| bounds.clamp(target))
            }
            ZoomControlMode::Velocity => target.clamp(-1.0, 1.0),
        };
        self.zoom_encoder.control(mode, target);
    }
}

impl std::fmt::Debug for CameraController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraController")
            .field("id", &self.state.id)
            .field("model", &self.state.model)
            .field("connected", &self.connected)
            .field("active", &self.state.active)
            .finish_non_exhaustive()
    }
}

/// A field the chosen mode uses is validated; an unused one is carried
/// over as is, or defaulted when nothing is known about it.
fn pick<T>(setting: &Setting<T>, requested: Option<T>, used: bool) -> Option<T>
where
    T: Ord + Clone + Default,
{
    if used {
        setting.resolve(requested)
    } else {
        Some(setting.fallback(requested).unwrap_or_default())
    }
}

fn outcome(sent: bool) -> Applied {
    if sent { Applied::Sent } else { Applied::Unchanged }
}

fn log_applied(camera: u8, setting: &'static str, applied: Applied) -> Applied {
    match applied {
        Applied::Rejected => debug!(camera, setting, "empty domain, request dropped"),
        Applied::Unchanged => debug!(camera, setting, "no command needed"),
        Applied::Sent => debug!(camera, setting, "command sent"),
    }
    applied
}
