// ── Camera persistence keys ──
//
// Preset entries hold what the user last asked for, field by field, so a
// partial request never erases the rest of a stored group. Capability
// entries hold what the device reported, so domains are known before the
// next connection.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{
    BracketingValue, BurstValue, CameraMode, CameraModel, EvCompensation, ExposureMode, Framerate,
    HyperlapseValue, IsoSensitivity, MeteringMode, PhotoCapability, PhotoFileFormat, PhotoFormat,
    PhotoMode, RecordingCapability, RecordingMode, Resolution, ShutterSpeed, Style,
    WhiteBalanceMode, WhiteBalanceTemperature,
};
use crate::setting::Bounds;
use crate::store::StorageEntry;

/// Declares a request struct whose fields are all optional. An absent
/// field falls back to the last request, then to the confirmed value.
macro_rules! request {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$field_meta:meta])* pub $field:ident: $ty:ty,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $name {
            /// `newer` fields win; absent ones keep the stored value.
            pub(crate) fn overlay(self, newer: Self) -> Self {
                Self {
                    $($field: newer.$field.or(self.$field),)*
                }
            }
        }
    };
}

request! {
    /// Photo configuration request.
    pub struct PhotoRequest {
        pub mode: PhotoMode,
        pub format: PhotoFormat,
        pub file_format: PhotoFileFormat,
        pub burst: BurstValue,
        pub bracketing: BracketingValue,
        pub timelapse_interval: f64,
        pub gpslapse_interval: f64,
    }
}

request! {
    /// Recording configuration request.
    pub struct RecordingRequest {
        pub mode: RecordingMode,
        pub resolution: Resolution,
        pub framerate: Framerate,
        pub hyperlapse: HyperlapseValue,
    }
}

request! {
    /// Exposure configuration request.
    pub struct ExposureRequest {
        pub mode: ExposureMode,
        pub shutter_speed: ShutterSpeed,
        pub iso: IsoSensitivity,
        pub max_iso: IsoSensitivity,
        pub metering_mode: MeteringMode,
    }
}

request! {
    pub struct WhiteBalanceRequest {
        pub mode: WhiteBalanceMode,
        pub temperature: WhiteBalanceTemperature,
    }
}

request! {
    pub struct StyleParamsRequest {
        pub saturation: i32,
        pub contrast: i32,
        pub sharpness: i32,
    }
}

/// Format choices remembered per photo and recording mode, so switching
/// back to a mode restores what was last used in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ModeFormats {
    pub(crate) photo_formats: BTreeMap<PhotoMode, PhotoFormat>,
    pub(crate) photo_file_formats: BTreeMap<PhotoMode, PhotoFileFormat>,
    pub(crate) resolutions: BTreeMap<RecordingMode, Resolution>,
    pub(crate) framerates: BTreeMap<RecordingMode, Framerate>,
}

impl ModeFormats {
    pub(crate) fn remember_photo(&mut self, mode: PhotoMode, format: PhotoFormat, file_format: PhotoFileFormat) {
        self.photo_formats.insert(mode, format);
        self.photo_file_formats.insert(mode, file_format);
    }

    /// Stored choices win over the ones learnt from the device.
    pub(crate) fn extend(&mut self, stored: Self) {
        self.photo_formats.extend(stored.photo_formats);
        self.photo_file_formats.extend(stored.photo_file_formats);
        self.resolutions.extend(stored.resolutions);
        self.framerates.extend(stored.framerates);
    }

    pub(crate) fn remember_recording(&mut self, mode: RecordingMode, resolution: Resolution, framerate: Framerate) {
        self.resolutions.insert(mode, resolution);
        self.framerates.insert(mode, framerate);
    }
}

// ── Preset dictionary ────────────────────────────────────────────────

pub(super) const MODE: StorageEntry<CameraMode> = StorageEntry::new("mode");
pub(super) const PHOTO: StorageEntry<PhotoRequest> = StorageEntry::new("photo");
pub(super) const RECORDING: StorageEntry<RecordingRequest> = StorageEntry::new("recording");
pub(super) const MODE_FORMATS: StorageEntry<ModeFormats> = StorageEntry::new("modeFormats");
pub(super) const EV_COMPENSATION: StorageEntry<EvCompensation> =
    StorageEntry::new("evCompensation");
pub(super) const EXPOSURE: StorageEntry<ExposureRequest> = StorageEntry::new("exposure");
pub(super) const WHITE_BALANCE: StorageEntry<WhiteBalanceRequest> =
    StorageEntry::new("whiteBalance");
pub(super) const STYLE: StorageEntry<Style> = StorageEntry::new("style");
pub(super) const STYLE_PARAMS: StorageEntry<StyleParamsRequest> =
    StorageEntry::new("styleParams");
pub(super) const AUTO_HDR: StorageEntry<bool> = StorageEntry::new("autoHdr");
pub(super) const AUTO_RECORD: StorageEntry<bool> = StorageEntry::new("autoRecord");
pub(super) const MAX_ZOOM_SPEED: StorageEntry<f64> = StorageEntry::new("maxZoomSpeed");
pub(super) const ZOOM_QUALITY_DEGRADATION: StorageEntry<bool> =
    StorageEntry::new("zoomQualityDegradation");

// ── Device dictionary ────────────────────────────────────────────────

pub(super) const MODEL: StorageEntry<CameraModel> = StorageEntry::new("model");
pub(super) const SUPPORTED_MODES: StorageEntry<BTreeSet<CameraMode>> =
    StorageEntry::new("supportedModes");
pub(super) const PHOTO_CAPABILITIES: StorageEntry<Vec<PhotoCapability>> =
    StorageEntry::new("photoCapabilities");
pub(super) const RECORDING_CAPABILITIES: StorageEntry<Vec<RecordingCapability>> =
    StorageEntry::new("recordingCapabilities");
pub(super) const BURST_VALUES: StorageEntry<BTreeSet<BurstValue>> =
    StorageEntry::new("supportedBurstValues");
pub(super) const BRACKETING_VALUES: StorageEntry<BTreeSet<BracketingValue>> =
    StorageEntry::new("supportedBracketingValues");
pub(super) const TIMELAPSE_RANGE: StorageEntry<Bounds<f64>> =
    StorageEntry::new("timelapseIntervalRange");
pub(super) const GPSLAPSE_RANGE: StorageEntry<Bounds<f64>> =
    StorageEntry::new("gpslapseIntervalRange");
pub(super) const HYPERLAPSE_VALUES: StorageEntry<BTreeSet<HyperlapseValue>> =
    StorageEntry::new("supportedHyperlapseValues");
pub(super) const EXPOSURE_MODES: StorageEntry<BTreeSet<ExposureMode>> =
    StorageEntry::new("supportedExposureModes");
pub(super) const SHUTTER_SPEEDS: StorageEntry<BTreeSet<ShutterSpeed>> =
    StorageEntry::new("supportedShutterSpeeds");
pub(super) const ISOS: StorageEntry<BTreeSet<IsoSensitivity>> =
    StorageEntry::new("supportedIsoSensitivities");
pub(super) const MAX_ISOS: StorageEntry<BTreeSet<IsoSensitivity>> =
    StorageEntry::new("supportedMaxIsoSensitivities");
pub(super) const METERING_MODES: StorageEntry<BTreeSet<MeteringMode>> =
    StorageEntry::new("supportedMeteringModes");
pub(super) const EV_COMPENSATIONS: StorageEntry<BTreeSet<EvCompensation>> =
    StorageEntry::new("supportedEvCompensations");
pub(super) const WHITE_BALANCE_MODES: StorageEntry<BTreeSet<WhiteBalanceMode>> =
    StorageEntry::new("supportedWhiteBalanceModes");
pub(super) const WHITE_BALANCE_TEMPERATURES: StorageEntry<BTreeSet<WhiteBalanceTemperature>> =
    StorageEntry::new("supportedWhiteBalanceTemperatures");
pub(super) const WHITE_BALANCE_LOCK_SUPPORTED: StorageEntry<bool> =
    StorageEntry::new("whiteBalanceLockSupported");
pub(super) const EXPOSURE_LOCK_SUPPORTED: StorageEntry<bool> =
    StorageEntry::new("exposureLockSupported");
pub(super) const STYLES: StorageEntry<BTreeSet<Style>> = StorageEntry::new("supportedStyles");
pub(super) const SATURATION_RANGE: StorageEntry<Bounds<i32>> =
    StorageEntry::new("saturationRange");
pub(super) const CONTRAST_RANGE: StorageEntry<Bounds<i32>> = StorageEntry::new("contrastRange");
pub(super) const SHARPNESS_RANGE: StorageEntry<Bounds<i32>> =
    StorageEntry::new("sharpnessRange");
pub(super) const AUTO_RECORD_SUPPORTED: StorageEntry<bool> =
    StorageEntry::new("autoRecordSupported");
pub(super) const AUTO_HDR_SUPPORTED: StorageEntry<bool> = StorageEntry::new("autoHdrSupported");
pub(super) const MAX_ZOOM_SPEED_RANGE: StorageEntry<Bounds<f64>> =
    StorageEntry::new("maxZoomSpeedRange");

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn overlay_keeps_stored_fields_the_request_omits() {
        let stored = PhotoRequest {
            mode: Some(PhotoMode::Burst),
            burst: Some(BurstValue::Burst10Over1s),
            ..PhotoRequest::default()
        };
        let newer = PhotoRequest {
            mode: Some(PhotoMode::Single),
            ..PhotoRequest::default()
        };

        let merged = stored.overlay(newer);
        assert_eq!(merged.mode, Some(PhotoMode::Single));
        assert_eq!(merged.burst, Some(BurstValue::Burst10Over1s));
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let request = WhiteBalanceRequest {
            mode: Some(WhiteBalanceMode::Custom),
            temperature: None,
        };
        assert_eq!(serde_json::to_value(request).unwrap(), json!({ "mode": "CUSTOM" }));

        let decoded: WhiteBalanceRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(decoded, WhiteBalanceRequest::default());
    }

    #[test]
    fn mode_formats_are_keyed_by_mode_name() {
        let mut formats = ModeFormats::default();
        formats.remember_photo(PhotoMode::Burst, PhotoFormat::Rectilinear, PhotoFileFormat::Dng);
        formats.remember_recording(RecordingMode::SlowMotion, Resolution::Res1080p, Framerate::Fps120);

        let value = serde_json::to_value(&formats).unwrap();
        assert_eq!(value["photoFormats"], json!({ "BURST": "RECTILINEAR" }));
        assert_eq!(value["framerates"], json!({ "SLOW_MOTION": "FPS120" }));

        let decoded: ModeFormats = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, formats);
    }
}
