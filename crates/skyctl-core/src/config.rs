// ── Runtime controller configuration ──
//
// Tuning knobs for the feature controllers. Core never reads config
// files: skyctl-config (or the embedding application) builds a
// `ControllerConfig` and hands it to `Device::new`.

use serde::{Deserialize, Serialize};

/// Configuration shared by every feature controller of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Keep device capabilities and user presets in the persistent store.
    /// When disabled, controllers run without device/preset dictionaries
    /// and unpublish cross-session components on disconnect.
    pub offline_settings: bool,

    /// How many times an unchanged absolute zoom command (or a zero
    /// velocity) is re-emitted on the non-acknowledged channel.
    pub zoom_repeat_bound: u16,

    /// Some firmware never sends the camera-states bitmask. When set, the
    /// main camera is assumed active if no bitmask arrived before the
    /// connection completed.
    pub assume_main_camera_active: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            offline_settings: true,
            zoom_repeat_bound: 10,
            assume_main_camera_active: true,
        }
    }
}
