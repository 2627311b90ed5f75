// ── Camera domain types ──
//
// Wire-mapped enums come from `wire_enum!` tables. Values are a
// representative subset of what cameras report; unknown wire values are
// rejected by the router before reaching a controller.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::wire_enum;

wire_enum! {
    /// Hardware model of a camera instance. Fixed for the instance lifetime.
    pub enum CameraModel {
        Main = 0,
        Thermal = 1,
        ThermalBlended = 2,
    }
}

wire_enum! {
    pub enum CameraMode {
        Recording = 0,
        Photo = 1,
    }
}

// ── Photo ────────────────────────────────────────────────────────────

wire_enum! {
    pub enum PhotoMode {
        Single = 0,
        Bracketing = 1,
        Burst = 2,
        TimeLapse = 3,
        GpsLapse = 4,
    }
}

wire_enum! {
    pub enum PhotoFormat {
        FullFrame = 0,
        Rectilinear = 1,
    }
}

wire_enum! {
    pub enum PhotoFileFormat {
        Jpeg = 0,
        Dng = 1,
        DngJpeg = 2,
    }
}

wire_enum! {
    /// Photo count over a duration, e.g. 14 photos over 4 seconds.
    pub enum BurstValue {
        Burst14Over4s = 0,
        Burst14Over2s = 1,
        Burst14Over1s = 2,
        Burst10Over4s = 3,
        Burst10Over2s = 4,
        Burst10Over1s = 5,
        Burst4Over4s = 6,
        Burst4Over2s = 7,
        Burst4Over1s = 8,
    }
}

wire_enum! {
    /// EV offsets shot around the reference exposure.
    pub enum BracketingValue {
        Ev1 = 0,
        Ev2 = 1,
        Ev3 = 2,
        Ev1Ev2 = 3,
        Ev1Ev3 = 4,
        Ev2Ev3 = 5,
        Ev1Ev2Ev3 = 6,
    }
}

// ── Recording ────────────────────────────────────────────────────────

wire_enum! {
    pub enum RecordingMode {
        Standard = 0,
        Hyperlapse = 1,
        SlowMotion = 2,
        HighFramerate = 3,
    }
}

wire_enum! {
    pub enum Resolution {
        ResDci4k = 0,
        ResUhd4k = 1,
        Res2_7k = 2,
        Res1080p = 3,
        Res720p = 4,
        Res480p = 5,
    }
}

wire_enum! {
    pub enum Framerate {
        Fps24 = 0,
        Fps25 = 1,
        Fps30 = 2,
        Fps48 = 3,
        Fps50 = 4,
        Fps60 = 5,
        Fps96 = 6,
        Fps100 = 7,
        Fps120 = 8,
    }
}

wire_enum! {
    /// One frame kept out of N.
    pub enum HyperlapseValue {
        Ratio15 = 0,
        Ratio30 = 1,
        Ratio60 = 2,
        Ratio120 = 3,
        Ratio240 = 4,
    }
}

// ── Exposure ─────────────────────────────────────────────────────────

wire_enum! {
    pub enum ExposureMode {
        Automatic = 0,
        AutomaticPreferIso = 1,
        AutomaticPreferShutterSpeed = 2,
        ManualIso = 3,
        ManualShutterSpeed = 4,
        Manual = 5,
    }
}

impl ExposureMode {
    /// Whether the manual shutter speed applies in this mode.
    pub fn uses_shutter_speed(self) -> bool {
        matches!(self, Self::Manual | Self::ManualShutterSpeed)
    }

    /// Whether the manual ISO sensitivity applies in this mode.
    pub fn uses_iso(self) -> bool {
        matches!(self, Self::Manual | Self::ManualIso)
    }

    /// Whether max ISO and metering mode apply in this mode.
    pub fn is_automatic(self) -> bool {
        matches!(
            self,
            Self::Automatic | Self::AutomaticPreferIso | Self::AutomaticPreferShutterSpeed
        )
    }
}

wire_enum! {
    pub enum ShutterSpeed {
        OneOver10000 = 0,
        OneOver4000 = 4,
        OneOver1000 = 10,
        OneOver500 = 13,
        OneOver240 = 16,
        OneOver120 = 19,
        OneOver100 = 20,
        OneOver60 = 22,
        OneOver30 = 25,
        OneOver15 = 27,
        OneOver4 = 31,
        One = 35,
    }
}

wire_enum! {
    pub enum IsoSensitivity {
        Iso50 = 0,
        Iso100 = 3,
        Iso200 = 6,
        Iso400 = 9,
        Iso800 = 12,
        Iso1600 = 14,
        Iso3200 = 16,
    }
}

wire_enum! {
    pub enum MeteringMode {
        Standard = 0,
        CenterTop = 1,
    }
}

wire_enum! {
    /// Exposure compensation in EV, one-third steps on the wire.
    pub enum EvCompensation {
        Minus3_00 = 0,
        Minus2_00 = 3,
        Minus1_00 = 6,
        Minus0_33 = 8,
        Zero = 9,
        Plus0_33 = 10,
        Plus1_00 = 12,
        Plus2_00 = 15,
        Plus3_00 = 18,
    }
}

/// Exposure lock requested by the user or reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExposureLockMode {
    #[default]
    None,
    /// Lock on the current exposure values.
    CurrentValues,
    /// Lock on an image region.
    Region,
}

/// Observable exposure lock state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExposureLock {
    pub mode: ExposureLockMode,
    /// Region center and size, relative to the image; zero unless `Region`.
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    pub updating: bool,
}

// ── White balance & style ────────────────────────────────────────────

wire_enum! {
    pub enum WhiteBalanceMode {
        Automatic = 0,
        Incandescent = 3,
        Fluorescent = 6,
        Daylight = 9,
        Cloudy = 11,
        Shaded = 14,
        Custom = 17,
    }
}

wire_enum! {
    /// Custom white balance temperature in Kelvin.
    pub enum WhiteBalanceTemperature {
        K2000 = 2,
        K3000 = 6,
        K4000 = 10,
        K5000 = 14,
        K6000 = 18,
        K7000 = 22,
        K8000 = 26,
    }
}

/// Observable white balance lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhiteBalanceLock {
    /// Locking only works in automatic white balance.
    pub lockable: bool,
    pub locked: bool,
    pub updating: bool,
}

wire_enum! {
    pub enum Style {
        Natural = 0,
        Plog = 1,
        Intense = 2,
        Pastel = 3,
    }
}

// ── Zoom ─────────────────────────────────────────────────────────────

wire_enum! {
    pub enum ZoomControlMode {
        /// Target is an absolute zoom level.
        Level = 0,
        /// Target is a signed speed ratio in `[-1, 1]`.
        Velocity = 1,
    }
}

// ── Capture progress ─────────────────────────────────────────────────

wire_enum! {
    pub enum PhotoResult {
        TakingPhoto = 0,
        PhotoTaken = 1,
        PhotoSaved = 2,
        ErrorNoStorageSpace = 3,
        ErrorBadState = 4,
        Error = 5,
    }
}

wire_enum! {
    pub enum RecordingResult {
        Started = 0,
        Stopped = 1,
        StoppedNoStorageSpace = 2,
        StoppedStorageTooSlow = 3,
        ErrorBadState = 4,
        Error = 5,
        StoppedReconfigured = 6,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhotoFunctionState {
    #[default]
    Unavailable,
    Stopped,
    Started,
    ErrorInsufficientStorage,
    ErrorInternal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoState {
    pub function_state: PhotoFunctionState,
    pub photo_count: u32,
    pub media_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingFunctionState {
    #[default]
    Unavailable,
    Stopped,
    Started,
    ErrorInsufficientStorageSpace,
    ErrorInsufficientStorageSpeed,
    ErrorInternal,
    ConfigurationChange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingState {
    pub function_state: RecordingFunctionState,
    pub start_time: Option<DateTime<Utc>>,
    pub media_id: Option<String>,
}

// ── Capabilities ─────────────────────────────────────────────────────

/// One photo capability entry: every combination of the listed modes,
/// formats and file formats is supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoCapability {
    pub modes: BTreeSet<PhotoMode>,
    pub formats: BTreeSet<PhotoFormat>,
    pub file_formats: BTreeSet<PhotoFileFormat>,
    pub hdr: bool,
}

/// One recording capability entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingCapability {
    pub modes: BTreeSet<RecordingMode>,
    pub resolutions: BTreeSet<Resolution>,
    pub framerates: BTreeSet<Framerate>,
    pub hdr: bool,
}

/// Photo modes supported by any capability entry.
pub fn photo_modes(caps: &[PhotoCapability]) -> BTreeSet<PhotoMode> {
    caps.iter().flat_map(|cap| cap.modes.iter().copied()).collect()
}

/// Formats supported in `mode`.
pub fn photo_formats(caps: &[PhotoCapability], mode: PhotoMode) -> BTreeSet<PhotoFormat> {
    caps.iter()
        .filter(|cap| cap.modes.contains(&mode))
        .flat_map(|cap| cap.formats.iter().copied())
        .collect()
}

/// File formats supported in `mode` with `format`.
pub fn photo_file_formats(
    caps: &[PhotoCapability],
    mode: PhotoMode,
    format: PhotoFormat,
) -> BTreeSet<PhotoFileFormat> {
    caps.iter()
        .filter(|cap| cap.modes.contains(&mode) && cap.formats.contains(&format))
        .flat_map(|cap| cap.file_formats.iter().copied())
        .collect()
}

/// Recording modes supported by any capability entry.
pub fn recording_modes(caps: &[RecordingCapability]) -> BTreeSet<RecordingMode> {
    caps.iter().flat_map(|cap| cap.modes.iter().copied()).collect()
}

/// Resolutions supported in `mode`.
pub fn resolutions(caps: &[RecordingCapability], mode: RecordingMode) -> BTreeSet<Resolution> {
    caps.iter()
        .filter(|cap| cap.modes.contains(&mode))
        .flat_map(|cap| cap.resolutions.iter().copied())
        .collect()
}

/// Framerates supported in `mode` at `resolution`.
pub fn framerates(
    caps: &[RecordingCapability],
    mode: RecordingMode,
    resolution: Resolution,
) -> BTreeSet<Framerate> {
    caps.iter()
        .filter(|cap| cap.modes.contains(&mode) && cap.resolutions.contains(&resolution))
        .flat_map(|cap| cap.framerates.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn photo_cap(modes: &[PhotoMode], formats: &[PhotoFormat], files: &[PhotoFileFormat]) -> PhotoCapability {
        PhotoCapability {
            modes: modes.iter().copied().collect(),
            formats: formats.iter().copied().collect(),
            file_formats: files.iter().copied().collect(),
            hdr: false,
        }
    }

    #[test]
    fn photo_domains_follow_capability_entries() {
        let caps = vec![
            photo_cap(
                &[PhotoMode::Single, PhotoMode::Burst],
                &[PhotoFormat::Rectilinear],
                &[PhotoFileFormat::Jpeg],
            ),
            photo_cap(
                &[PhotoMode::Single],
                &[PhotoFormat::FullFrame],
                &[PhotoFileFormat::Dng, PhotoFileFormat::DngJpeg],
            ),
        ];

        assert_eq!(
            photo_modes(&caps),
            BTreeSet::from([PhotoMode::Single, PhotoMode::Burst])
        );
        assert_eq!(
            photo_formats(&caps, PhotoMode::Burst),
            BTreeSet::from([PhotoFormat::Rectilinear])
        );
        assert_eq!(
            photo_file_formats(&caps, PhotoMode::Single, PhotoFormat::FullFrame),
            BTreeSet::from([PhotoFileFormat::Dng, PhotoFileFormat::DngJpeg])
        );
        assert!(photo_file_formats(&caps, PhotoMode::Burst, PhotoFormat::FullFrame).is_empty());
    }

    #[test]
    fn exposure_mode_field_relevance() {
        assert!(ExposureMode::Manual.uses_shutter_speed());
        assert!(ExposureMode::Manual.uses_iso());
        assert!(!ExposureMode::ManualIso.uses_shutter_speed());
        assert!(ExposureMode::AutomaticPreferIso.is_automatic());
        assert!(!ExposureMode::ManualShutterSpeed.is_automatic());
    }

    #[test]
    fn ev_bitfield_uses_third_steps() {
        let evs = EvCompensation::from_bitfield((1 << 6) | (1 << 9) | (1 << 12));
        assert_eq!(
            evs,
            BTreeSet::from([EvCompensation::Minus1_00, EvCompensation::Zero, EvCompensation::Plus1_00])
        );
    }
}
