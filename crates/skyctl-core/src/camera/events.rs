// ── Camera event handling ──
//
// Inbound events always refresh the confirmed values and the domains;
// visible values follow only once connected, so the initial state dump
// of a new session does not overwrite the presets being replayed.

use std::collections::BTreeSet;

use chrono::DateTime;
use tracing::debug;

use super::controller::CameraController;
use super::presets;
use super::ZoomState;
use crate::error::RejectedEvent;
use crate::event::CameraEvent;
use crate::model::camera::{framerates, photo_file_formats, photo_formats, photo_modes, recording_modes, resolutions};
use crate::model::{
    BracketingValue, BurstValue, CameraMode, EvCompensation, ExposureLock, ExposureLockMode,
    ExposureMode, Framerate, HyperlapseValue, IsoSensitivity, MeteringMode, PhotoCapability,
    PhotoFileFormat, PhotoFormat, PhotoFunctionState, PhotoMode, PhotoResult, RecordingCapability,
    RecordingFunctionState, RecordingMode, RecordingResult, Resolution, ShutterSpeed, Style,
    WhiteBalanceLock, WhiteBalanceMode, WhiteBalanceTemperature,
};
use crate::setting::{Bounds, Toggle};
use crate::wire::{Availability, Supported, SwitchState};

/// Decodes a required wire value, rejecting the whole event if unknown.
fn required<T>(decoded: Option<T>, event: &CameraEvent, field: &'static str) -> Result<T, RejectedEvent> {
    decoded.ok_or_else(|| RejectedEvent::field(event.name(), field))
}

fn range<T: PartialOrd + Copy>(
    min: T,
    max: T,
    event: &CameraEvent,
    field: &'static str,
) -> Result<Bounds<T>, RejectedEvent> {
    Bounds::new(min, max).ok_or_else(|| RejectedEvent::range(event.name(), field))
}

fn in_unit_range(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

impl CameraController {
    /// Handles one event addressed to this camera. The router has already
    /// matched the camera id.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn on_event(&mut self, event: &CameraEvent) -> Result<(), RejectedEvent> {
        let connected = self.connected;
        match event {
            CameraEvent::Capabilities {
                modes,
                exposure_modes,
                exposure_lock_supported,
                ev_compensations,
                white_balance_modes,
                white_balance_temperatures,
                white_balance_lock_supported,
                styles,
                hyperlapse_values,
                bracketing_values,
                burst_values,
                metering_modes,
                timelapse_interval_min,
                gpslapse_interval_min,
                ..
            } => {
                let timelapse = range(f64::from(*timelapse_interval_min), f64::MAX, event, "timelapse interval")?;
                let gpslapse = range(f64::from(*gpslapse_interval_min), f64::MAX, event, "gpslapse interval")?;
                self.on_capabilities(CameraCapabilities {
                    modes: CameraMode::from_bitfield(*modes),
                    exposure_modes: ExposureMode::from_bitfield(*exposure_modes),
                    exposure_lock: Supported::from_wire(*exposure_lock_supported)
                        .is_some_and(Supported::is_supported),
                    ev_compensations: EvCompensation::from_bitfield(*ev_compensations),
                    white_balance_modes: WhiteBalanceMode::from_bitfield(*white_balance_modes),
                    white_balance_temperatures: WhiteBalanceTemperature::from_bitfield(
                        *white_balance_temperatures,
                    ),
                    white_balance_lock: Supported::from_wire(*white_balance_lock_supported)
                        .is_some_and(Supported::is_supported),
                    styles: Style::from_bitfield(*styles),
                    hyperlapse_values: HyperlapseValue::from_bitfield(*hyperlapse_values),
                    bracketing_values: BracketingValue::from_bitfield(*bracketing_values),
                    burst_values: BurstValue::from_bitfield(*burst_values),
                    metering_modes: MeteringMode::from_bitfield(*metering_modes),
                    timelapse,
                    gpslapse,
                });
            }

            CameraEvent::CameraMode { mode, .. } => {
                let mode = required(CameraMode::from_wire(*mode), event, "mode")?;
                self.state.mode.confirm(mode, connected);
            }

            CameraEvent::PhotoMode {
                mode,
                format,
                file_format,
                burst,
                bracketing,
                capture_interval,
                ..
            } => {
                let mode = required(PhotoMode::from_wire(*mode), event, "mode")?;
                let format = required(PhotoFormat::from_wire(*format), event, "format")?;
                let file_format = required(PhotoFileFormat::from_wire(*file_format), event, "file format")?;
                let burst = required(BurstValue::from_wire(*burst), event, "burst")?;
                let bracketing = required(BracketingValue::from_wire(*bracketing), event, "bracketing")?;
                let interval = f64::from(*capture_interval);

                let photo = &mut self.state.photo;
                photo.mode.confirm(mode, connected);
                photo.format.confirm(format, connected);
                photo.file_format.confirm(file_format, connected);
                self.mode_formats.remember_photo(mode, format, file_format);
                match mode {
                    PhotoMode::Single => {}
                    PhotoMode::Burst => photo.burst.confirm(burst, connected),
                    PhotoMode::Bracketing => photo.bracketing.confirm(bracketing, connected),
                    PhotoMode::TimeLapse => photo.timelapse_interval.confirm(interval, connected),
                    PhotoMode::GpsLapse => photo.gpslapse_interval.confirm(interval, connected),
                }
                if connected {
                    self.refresh_photo_domains();
                }
            }

            CameraEvent::RecordingMode {
                mode,
                resolution,
                framerate,
                hyperlapse,
                bitrate,
                ..
            } => {
                let mode = required(RecordingMode::from_wire(*mode), event, "mode")?;
                let resolution = required(Resolution::from_wire(*resolution), event, "resolution")?;
                let framerate = required(Framerate::from_wire(*framerate), event, "framerate")?;
                let hyperlapse = required(HyperlapseValue::from_wire(*hyperlapse), event, "hyperlapse")?;

                let recording = &mut self.state.recording;
                recording.mode.confirm(mode, connected);
                recording.resolution.confirm(resolution, connected);
                recording.framerate.confirm(framerate, connected);
                self.mode_formats.remember_recording(mode, resolution, framerate);
                if mode == RecordingMode::Hyperlapse {
                    recording.hyperlapse.confirm(hyperlapse, connected);
                }
                recording.bitrate = *bitrate;
                self.recording_bitrate = *bitrate;
                if connected {
                    self.refresh_recording_domains();
                }
            }

            CameraEvent::EvCompensation { value, .. } => {
                let value = required(EvCompensation::from_wire(*value), event, "value")?;
                self.state.ev_compensation.confirm(value, connected);
            }

            CameraEvent::ExposureSettings {
                mode,
                shutter_speed,
                shutter_speeds,
                iso,
                isos,
                max_iso,
                max_isos,
                metering_mode,
                ..
            } => {
                let mode = required(ExposureMode::from_wire(*mode), event, "mode")?;
                let shutter_speed = required(ShutterSpeed::from_wire(*shutter_speed), event, "shutter speed")?;
                let iso = required(IsoSensitivity::from_wire(*iso), event, "iso")?;
                let max_iso = required(IsoSensitivity::from_wire(*max_iso), event, "max iso")?;
                let metering_mode = required(MeteringMode::from_wire(*metering_mode), event, "metering mode")?;

                let dict = self.device_dict.as_ref();
                let shutter_speeds = ShutterSpeed::from_bitfield(*shutter_speeds);
                let isos = IsoSensitivity::from_bitfield(*isos);
                let max_isos = IsoSensitivity::from_bitfield(*max_isos);
                presets::SHUTTER_SPEEDS.save(dict, &shutter_speeds);
                presets::ISOS.save(dict, &isos);
                presets::MAX_ISOS.save(dict, &max_isos);

                let exposure = &mut self.state.exposure;
                exposure.shutter_speed.set_domain(shutter_speeds);
                exposure.iso.set_domain(isos);
                exposure.max_iso.set_domain(max_isos);
                exposure.mode.confirm(mode, connected);
                exposure
                    .shutter_speed
                    .confirm(shutter_speed, connected && mode.uses_shutter_speed());
                exposure.iso.confirm(iso, connected && mode.uses_iso());
                exposure.max_iso.confirm(max_iso, connected && mode.is_automatic());
                exposure
                    .metering_mode
                    .confirm(metering_mode, connected && mode.is_automatic());
                if connected {
                    self.refresh_ev_domain();
                }
            }

            CameraEvent::Exposure {
                lock,
                center_x,
                center_y,
                width,
                height,
                ..
            } => {
                let state = required(SwitchState::from_wire(*lock), event, "lock")?;
                let lock = decode_lock(state, *center_x, *center_y, *width, *height);
                self.on_exposure_lock(lock);
            }

            CameraEvent::WhiteBalance {
                mode,
                temperature,
                lock,
                ..
            } => {
                let mode = required(WhiteBalanceMode::from_wire(*mode), event, "mode")?;
                let temperature = required(WhiteBalanceTemperature::from_wire(*temperature), event, "temperature")?;
                let locked = required(SwitchState::from_wire(*lock), event, "lock")?.is_active();

                let white_balance = &mut self.state.white_balance;
                white_balance.mode.confirm(mode, connected);
                white_balance
                    .temperature
                    .confirm(temperature, connected && mode == WhiteBalanceMode::Custom);
                if connected {
                    if let Some(lock) = &mut self.state.white_balance_lock {
                        lock.lockable = mode == WhiteBalanceMode::Automatic;
                        lock.locked = locked;
                        lock.updating = false;
                    }
                }
            }

            CameraEvent::AutoRecord { state, .. } => {
                let active = required(SwitchState::from_wire(*state), event, "state")?.is_active();
                presets::AUTO_RECORD_SUPPORTED.save(self.device_dict.as_ref(), &true);
                self.state
                    .auto_record
                    .get_or_insert_with(Toggle::default)
                    .confirm(active, connected);
            }

            CameraEvent::HdrSetting { state, .. } => {
                let active = required(SwitchState::from_wire(*state), event, "state")?.is_active();
                presets::AUTO_HDR_SUPPORTED.save(self.device_dict.as_ref(), &true);
                self.state
                    .auto_hdr
                    .get_or_insert_with(Toggle::default)
                    .confirm(active, connected);
            }

            CameraEvent::Hdr { available, state, .. } => {
                let available = required(Availability::from_wire(*available), event, "available")?;
                let state = required(SwitchState::from_wire(*state), event, "state")?;
                self.state.hdr_available = available.is_available();
                self.state.hdr_active = state.is_active();
            }

            CameraEvent::Style {
                style,
                saturation,
                saturation_min,
                saturation_max,
                contrast,
                contrast_min,
                contrast_max,
                sharpness,
                sharpness_min,
                sharpness_max,
                ..
            } => {
                let style = required(Style::from_wire(*style), event, "style")?;
                let saturation_range = range(*saturation_min, *saturation_max, event, "saturation")?;
                let contrast_range = range(*contrast_min, *contrast_max, event, "contrast")?;
                let sharpness_range = range(*sharpness_min, *sharpness_max, event, "sharpness")?;

                let dict = self.device_dict.as_ref();
                presets::SATURATION_RANGE.save(dict, &saturation_range);
                presets::CONTRAST_RANGE.save(dict, &contrast_range);
                presets::SHARPNESS_RANGE.save(dict, &sharpness_range);

                let settings = &mut self.state.style;
                settings.saturation.set_domain(Some(saturation_range));
                settings.contrast.set_domain(Some(contrast_range));
                settings.sharpness.set_domain(Some(sharpness_range));
                settings.style.confirm(style, connected);
                settings.saturation.confirm(*saturation, connected);
                settings.contrast.confirm(*contrast, connected);
                settings.sharpness.confirm(*sharpness, connected);
            }

            CameraEvent::MaxZoomSpeed { min, max, current, .. } => {
                let bounds = range(f64::from(*min), f64::from(*max), event, "max zoom speed")?;
                presets::MAX_ZOOM_SPEED_RANGE.save(self.device_dict.as_ref(), &bounds);
                let zoom = self.state.zoom.get_or_insert_with(ZoomState::default);
                zoom.max_speed.set_domain(Some(bounds));
                zoom.max_speed.confirm(f64::from(*current), connected);
            }

            CameraEvent::ZoomVelocityQualityDegradation { allowed, .. } => {
                self.state
                    .zoom
                    .get_or_insert_with(ZoomState::default)
                    .quality_degradation
                    .confirm(*allowed != 0, connected);
            }

            CameraEvent::ZoomLevel { level, .. } => {
                self.state.zoom.get_or_insert_with(ZoomState::default).current_level = f64::from(*level);
            }

            CameraEvent::ZoomInfo {
                available,
                max_lossless_level,
                max_lossy_level,
                ..
            } => {
                let available = required(Availability::from_wire(*available), event, "available")?.is_available();
                if available && (*max_lossless_level < 1.0 || *max_lossy_level < 1.0) {
                    return Err(RejectedEvent::range(event.name(), "max zoom level"));
                }
                let zoom = self.state.zoom.get_or_insert_with(ZoomState::default);
                zoom.available = available;
                if available {
                    zoom.max_lossless_level = f64::from(*max_lossless_level);
                    zoom.max_lossy_level = f64::from(*max_lossy_level);
                }
            }

            CameraEvent::PhotoProgress {
                result,
                photo_count,
                media_id,
                ..
            } => {
                let result = required(PhotoResult::from_wire(*result), event, "result")?;
                let photo_state = &mut self.state.photo_state;
                match result {
                    PhotoResult::TakingPhoto | PhotoResult::ErrorBadState => {}
                    PhotoResult::PhotoTaken => photo_state.photo_count = *photo_count,
                    PhotoResult::PhotoSaved => photo_state.function_state = PhotoFunctionState::Stopped,
                    PhotoResult::ErrorNoStorageSpace => {
                        photo_state.function_state = PhotoFunctionState::ErrorInsufficientStorage;
                    }
                    PhotoResult::Error => photo_state.function_state = PhotoFunctionState::ErrorInternal,
                }
                if !media_id.is_empty() {
                    photo_state.media_id = Some(media_id.clone());
                }
            }

            CameraEvent::PhotoState { available, state, .. } => {
                let available = required(Availability::from_wire(*available), event, "available")?.is_available();
                let active = required(SwitchState::from_wire(*state), event, "state")?.is_active();
                self.state.photo_state.function_state = match (available, active) {
                    (false, _) => PhotoFunctionState::Unavailable,
                    (true, true) => PhotoFunctionState::Started,
                    (true, false) => PhotoFunctionState::Stopped,
                };
            }

            CameraEvent::RecordingProgress { result, media_id, .. } => {
                let result = required(RecordingResult::from_wire(*result), event, "result")?;
                let recording_state = &mut self.state.recording_state;
                let function_state = match result {
                    RecordingResult::Started | RecordingResult::ErrorBadState => None,
                    RecordingResult::Stopped => Some(RecordingFunctionState::Stopped),
                    RecordingResult::StoppedNoStorageSpace => {
                        Some(RecordingFunctionState::ErrorInsufficientStorageSpace)
                    }
                    RecordingResult::StoppedStorageTooSlow => {
                        Some(RecordingFunctionState::ErrorInsufficientStorageSpeed)
                    }
                    RecordingResult::Error => Some(RecordingFunctionState::ErrorInternal),
                    RecordingResult::StoppedReconfigured => Some(RecordingFunctionState::ConfigurationChange),
                };
                if let Some(function_state) = function_state {
                    recording_state.function_state = function_state;
                }
                if !media_id.is_empty() {
                    recording_state.media_id = Some(media_id.clone());
                }
            }

            CameraEvent::RecordingState {
                available,
                state,
                start_timestamp,
                ..
            } => {
                let available = required(Availability::from_wire(*available), event, "available")?.is_available();
                let active = required(SwitchState::from_wire(*state), event, "state")?.is_active();
                let recording_state = &mut self.state.recording_state;
                recording_state.function_state = match (available, active) {
                    (false, _) => RecordingFunctionState::Unavailable,
                    (true, true) => RecordingFunctionState::Started,
                    (true, false) => RecordingFunctionState::Stopped,
                };
                if active {
                    recording_state.start_time = i64::try_from(*start_timestamp)
                        .ok()
                        .and_then(DateTime::from_timestamp_millis);
                }
            }

            CameraEvent::PhotoCapabilities { .. }
            | CameraEvent::RecordingCapabilities { .. }
            | CameraEvent::CameraStates { .. }
            | CameraEvent::AntiFlickerCapabilities { .. }
            | CameraEvent::AntiFlickerMode { .. } => return Ok(()),
        }

        self.notify();
        Ok(())
    }

    fn on_capabilities(&mut self, caps: CameraCapabilities) {
        let dict = self.device_dict.clone();
        let dict = dict.as_ref();

        presets::SUPPORTED_MODES.save(dict, &caps.modes);
        presets::EXPOSURE_MODES.save(dict, &caps.exposure_modes);
        presets::METERING_MODES.save(dict, &caps.metering_modes);
        presets::EV_COMPENSATIONS.save(dict, &caps.ev_compensations);
        presets::EXPOSURE_LOCK_SUPPORTED.save(dict, &caps.exposure_lock);
        presets::WHITE_BALANCE_MODES.save(dict, &caps.white_balance_modes);
        presets::WHITE_BALANCE_TEMPERATURES.save(dict, &caps.white_balance_temperatures);
        presets::WHITE_BALANCE_LOCK_SUPPORTED.save(dict, &caps.white_balance_lock);
        presets::STYLES.save(dict, &caps.styles);
        presets::HYPERLAPSE_VALUES.save(dict, &caps.hyperlapse_values);
        presets::BURST_VALUES.save(dict, &caps.burst_values);
        presets::BRACKETING_VALUES.save(dict, &caps.bracketing_values);
        presets::TIMELAPSE_RANGE.save(dict, &caps.timelapse);
        presets::GPSLAPSE_RANGE.save(dict, &caps.gpslapse);

        let state = &mut self.state;
        state.mode.set_domain(caps.modes);
        state.exposure.mode.set_domain(caps.exposure_modes);
        state.exposure.metering_mode.set_domain(caps.metering_modes);
        if caps.exposure_lock {
            state.exposure_lock.get_or_insert_with(ExposureLock::default);
        }
        state.white_balance.mode.set_domain(caps.white_balance_modes);
        state.white_balance.temperature.set_domain(caps.white_balance_temperatures);
        if caps.white_balance_lock {
            state.white_balance_lock.get_or_insert_with(WhiteBalanceLock::default);
        }
        state.style.style.set_domain(caps.styles);
        state.recording.hyperlapse.set_domain(caps.hyperlapse_values);
        state.photo.burst.set_domain(caps.burst_values);
        state.photo.bracketing.set_domain(caps.bracketing_values);
        state.photo.timelapse_interval.set_domain(Some(caps.timelapse));
        state.photo.gpslapse_interval.set_domain(Some(caps.gpslapse));

        self.caps.ev_compensations = caps.ev_compensations;
        self.refresh_ev_domain();
    }

    /// A complete photo capability list was assembled.
    pub(crate) fn on_photo_capabilities(&mut self, caps: Vec<PhotoCapability>) {
        debug!(camera = self.id(), entries = caps.len(), "photo capabilities");
        presets::PHOTO_CAPABILITIES.save(self.device_dict.as_ref(), &caps);
        self.state.photo.mode.set_domain(photo_modes(&caps));
        self.caps.photo = caps;
        self.refresh_photo_domains();
        self.notify();
    }

    /// A complete recording capability list was assembled.
    pub(crate) fn on_recording_capabilities(&mut self, caps: Vec<RecordingCapability>) {
        debug!(camera = self.id(), entries = caps.len(), "recording capabilities");
        presets::RECORDING_CAPABILITIES.save(self.device_dict.as_ref(), &caps);
        self.state.recording.mode.set_domain(recording_modes(&caps));
        self.caps.recording = caps;
        self.refresh_recording_domains();
        self.notify();
    }

    /// Format domains follow the visible photo mode and format.
    fn refresh_photo_domains(&mut self) {
        let caps = &self.caps.photo;
        let photo = &mut self.state.photo;
        let Some(mode) = photo.mode.value().copied() else {
            return;
        };
        photo.format.set_domain(photo_formats(caps, mode));
        if let Some(format) = photo.format.value().copied() {
            photo.file_format.set_domain(photo_file_formats(caps, mode, format));
        }
    }

    /// Resolution and framerate domains follow the visible recording mode.
    fn refresh_recording_domains(&mut self) {
        let caps = &self.caps.recording;
        let recording = &mut self.state.recording;
        let Some(mode) = recording.mode.value().copied() else {
            return;
        };
        recording.resolution.set_domain(resolutions(caps, mode));
        if let Some(resolution) = recording.resolution.value().copied() {
            recording.framerate.set_domain(framerates(caps, mode, resolution));
        }
    }

    /// Applies a lock report unless it contradicts a pending request.
    fn on_exposure_lock(&mut self, lock: ExposureLock) {
        if let Some(pending) = self.pending_lock {
            if !pending.is_confirmed_by(&lock) {
                debug!(camera = self.id(), ?pending, reported = ?lock.mode, "lock report does not match request, dropped");
                return;
            }
        }
        self.pending_lock = None;
        self.state.exposure_lock = Some(lock);
        self.refresh_ev_domain();
    }
}

/// Decoded camera capabilities event.
struct CameraCapabilities {
    modes: BTreeSet<CameraMode>,
    exposure_modes: BTreeSet<ExposureMode>,
    exposure_lock: bool,
    ev_compensations: BTreeSet<EvCompensation>,
    white_balance_modes: BTreeSet<WhiteBalanceMode>,
    white_balance_temperatures: BTreeSet<WhiteBalanceTemperature>,
    white_balance_lock: bool,
    styles: BTreeSet<Style>,
    hyperlapse_values: BTreeSet<HyperlapseValue>,
    bracketing_values: BTreeSet<BracketingValue>,
    burst_values: BTreeSet<BurstValue>,
    metering_modes: BTreeSet<MeteringMode>,
    timelapse: Bounds<f64>,
    gpslapse: Bounds<f64>,
}

/// Maps the wire lock state onto a lock mode. A region is only reported
/// when every coordinate is a valid relative value.
fn decode_lock(state: SwitchState, center_x: f32, center_y: f32, width: f32, height: f32) -> ExposureLock {
    let region = [center_x, center_y, width, height].into_iter().all(in_unit_range);
    let mode = match state {
        SwitchState::Inactive => ExposureLockMode::None,
        SwitchState::Active if region => ExposureLockMode::Region,
        SwitchState::Active => ExposureLockMode::CurrentValues,
    };
    if mode == ExposureLockMode::Region {
        ExposureLock {
            mode,
            center_x: f64::from(center_x),
            center_y: f64::from(center_y),
            width: f64::from(width),
            height: f64::from(height),
            updating: false,
        }
    } else {
        ExposureLock {
            mode,
            ..ExposureLock::default()
        }
    }
}
