// ── Inbound events ──
//
// Decoded protocol events as the transport hands them over: enums are
// still raw wire values, bitfields are still integers. Controllers map
// them onto domain types and reject the event wholesale when a required
// value is unknown.

/// One inbound event from the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Camera(CameraEvent),
    Battery(BatteryEvent),
    Piloting(PilotingEvent),
}

/// Camera feature events. Camera-scoped events carry the camera id.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraEvent {
    Capabilities {
        cam_id: u8,
        model: u32,
        modes: u64,
        exposure_modes: u64,
        exposure_lock_supported: u32,
        exposure_roi_lock_supported: u32,
        ev_compensations: u64,
        white_balance_modes: u64,
        white_balance_temperatures: u64,
        white_balance_lock_supported: u32,
        styles: u64,
        hyperlapse_values: u64,
        bracketing_values: u64,
        burst_values: u64,
        metering_modes: u64,
        timelapse_interval_min: f32,
        gpslapse_interval_min: f32,
    },
    /// One element of the streamed photo capability list.
    /// `id = (camera id << 8) | index`.
    PhotoCapabilities {
        id: u16,
        modes: u64,
        formats: u64,
        file_formats: u64,
        hdr: u32,
        list_flags: u8,
    },
    /// One element of the streamed recording capability list.
    RecordingCapabilities {
        id: u16,
        modes: u64,
        resolutions: u64,
        framerates: u64,
        hdr: u32,
        list_flags: u8,
    },
    /// Bit `n` set means camera `n` is active.
    CameraStates { active_cameras: u64 },
    CameraMode { cam_id: u8, mode: u32 },
    PhotoMode {
        cam_id: u8,
        mode: u32,
        format: u32,
        file_format: u32,
        burst: u32,
        bracketing: u32,
        capture_interval: f32,
    },
    RecordingMode {
        cam_id: u8,
        mode: u32,
        resolution: u32,
        framerate: u32,
        hyperlapse: u32,
        bitrate: u32,
    },
    EvCompensation { cam_id: u8, value: u32 },
    ExposureSettings {
        cam_id: u8,
        mode: u32,
        shutter_speed: u32,
        shutter_speeds: u64,
        iso: u32,
        isos: u64,
        max_iso: u32,
        max_isos: u64,
        metering_mode: u32,
    },
    /// Effective exposure; carries the lock state and region.
    Exposure {
        cam_id: u8,
        lock: u32,
        center_x: f32,
        center_y: f32,
        width: f32,
        height: f32,
    },
    WhiteBalance {
        cam_id: u8,
        mode: u32,
        temperature: u32,
        lock: u32,
    },
    AutoRecord { cam_id: u8, state: u32 },
    HdrSetting { cam_id: u8, state: u32 },
    Hdr {
        cam_id: u8,
        available: u32,
        state: u32,
    },
    Style {
        cam_id: u8,
        style: u32,
        saturation: i32,
        saturation_min: i32,
        saturation_max: i32,
        contrast: i32,
        contrast_min: i32,
        contrast_max: i32,
        sharpness: i32,
        sharpness_min: i32,
        sharpness_max: i32,
    },
    MaxZoomSpeed {
        cam_id: u8,
        min: f32,
        max: f32,
        current: f32,
    },
    ZoomVelocityQualityDegradation { cam_id: u8, allowed: u8 },
    ZoomLevel { cam_id: u8, level: f32 },
    ZoomInfo {
        cam_id: u8,
        available: u32,
        max_lossless_level: f32,
        max_lossy_level: f32,
    },
    PhotoProgress {
        cam_id: u8,
        result: u32,
        photo_count: u32,
        media_id: String,
    },
    PhotoState {
        cam_id: u8,
        available: u32,
        state: u32,
    },
    RecordingProgress {
        cam_id: u8,
        result: u32,
        media_id: String,
    },
    RecordingState {
        cam_id: u8,
        available: u32,
        state: u32,
        /// Milliseconds since the Unix epoch.
        start_timestamp: u64,
    },
    AntiFlickerCapabilities { modes: u64 },
    AntiFlickerMode { mode: u32, value: u32 },
}

impl CameraEvent {
    /// Camera addressed by a camera-scoped event.
    pub fn cam_id(&self) -> Option<u8> {
        match self {
            Self::Capabilities { cam_id, .. }
            | Self::CameraMode { cam_id, .. }
            | Self::PhotoMode { cam_id, .. }
            | Self::RecordingMode { cam_id, .. }
            | Self::EvCompensation { cam_id, .. }
            | Self::ExposureSettings { cam_id, .. }
            | Self::Exposure { cam_id, .. }
            | Self::WhiteBalance { cam_id, .. }
            | Self::AutoRecord { cam_id, .. }
            | Self::HdrSetting { cam_id, .. }
            | Self::Hdr { cam_id, .. }
            | Self::Style { cam_id, .. }
            | Self::MaxZoomSpeed { cam_id, .. }
            | Self::ZoomVelocityQualityDegradation { cam_id, .. }
            | Self::ZoomLevel { cam_id, .. }
            | Self::ZoomInfo { cam_id, .. }
            | Self::PhotoProgress { cam_id, .. }
            | Self::PhotoState { cam_id, .. }
            | Self::RecordingProgress { cam_id, .. }
            | Self::RecordingState { cam_id, .. } => Some(*cam_id),
            Self::PhotoCapabilities { .. }
            | Self::RecordingCapabilities { .. }
            | Self::CameraStates { .. }
            | Self::AntiFlickerCapabilities { .. }
            | Self::AntiFlickerMode { .. } => None,
        }
    }

    /// Short name used in logs and rejection errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capabilities { .. } => "camera capabilities",
            Self::PhotoCapabilities { .. } => "photo capabilities",
            Self::RecordingCapabilities { .. } => "recording capabilities",
            Self::CameraStates { .. } => "camera states",
            Self::CameraMode { .. } => "camera mode",
            Self::PhotoMode { .. } => "photo mode",
            Self::RecordingMode { .. } => "recording mode",
            Self::EvCompensation { .. } => "EV compensation",
            Self::ExposureSettings { .. } => "exposure settings",
            Self::Exposure { .. } => "exposure",
            Self::WhiteBalance { .. } => "white balance",
            Self::AutoRecord { .. } => "auto-record",
            Self::HdrSetting { .. } => "auto-HDR",
            Self::Hdr { .. } => "HDR",
            Self::Style { .. } => "style",
            Self::MaxZoomSpeed { .. } => "max zoom speed",
            Self::ZoomVelocityQualityDegradation { .. } => "zoom quality degradation",
            Self::ZoomLevel { .. } => "zoom level",
            Self::ZoomInfo { .. } => "zoom info",
            Self::PhotoProgress { .. } => "photo progress",
            Self::PhotoState { .. } => "photo state",
            Self::RecordingProgress { .. } => "recording progress",
            Self::RecordingState { .. } => "recording state",
            Self::AntiFlickerCapabilities { .. } => "anti-flicker capabilities",
            Self::AntiFlickerMode { .. } => "anti-flicker mode",
        }
    }
}

/// Battery feature events.
#[derive(Debug, Clone, PartialEq)]
pub enum BatteryEvent {
    /// One element of the streamed alert list. `alert` and `level` may be
    /// absent on `EMPTY` events.
    Alert {
        alert: Option<u32>,
        level: Option<u32>,
        list_flags: u8,
    },
}

/// Piloting state events.
#[derive(Debug, Clone, PartialEq)]
pub enum PilotingEvent {
    FlyingStateChanged { state: u32 },
    AlertStateChanged { state: u32 },
    WindStateChanged { state: u32 },
    VibrationLevelChanged { state: u32 },
    /// Non-zero means the condition is present.
    HoveringWarning { no_gps_too_dark: u8, no_gps_too_high: u8 },
    /// `500.0` in any coordinate means unknown.
    PositionChanged {
        latitude: f64,
        longitude: f64,
        altitude: f64,
    },
    GpsFixChanged { fixed: u8 },
    SatelliteCount { count: u8 },
}
