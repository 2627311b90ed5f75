// ── Domain model ──
//
// Typed values exposed by the controllers. Anything that travels on the
// wire as an integer is declared with `wire_enum!` so its table lives
// next to the type.

pub mod alarm;
pub mod anti_flicker;
pub mod camera;
pub mod gps;

// ── Re-exports ──────────────────────────────────────────────────────

pub use alarm::{
    AlarmKind, AlarmLevel, AlertLevel, BatteryAlert, ConditionLevel, FlyingState, PilotingAlert,
};
pub use anti_flicker::{AntiFlickerMode, AntiFlickerValue};
pub use camera::{
    BracketingValue, BurstValue, CameraMode, CameraModel, EvCompensation, ExposureLock,
    ExposureLockMode, ExposureMode, Framerate, HyperlapseValue, IsoSensitivity, MeteringMode,
    PhotoCapability, PhotoFileFormat, PhotoFormat, PhotoFunctionState, PhotoMode, PhotoResult,
    PhotoState, RecordingCapability, RecordingFunctionState, RecordingMode, RecordingResult,
    RecordingState, Resolution, ShutterSpeed, Style, WhiteBalanceLock, WhiteBalanceMode,
    WhiteBalanceTemperature, ZoomControlMode,
};
pub use gps::Location;
