use crate::wire::wire_enum;

wire_enum! {
    /// Anti-flicker mode, as requested or as reported by the device.
    pub enum AntiFlickerMode {
        Off = 0,
        Hz50 = 1,
        Hz60 = 2,
        /// Device picks the frequency. Emulated from the location when the
        /// device cannot.
        Auto = 3,
    }
}

/// Frequency the device is effectively filtering.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AntiFlickerValue {
    #[default]
    Unknown,
    Off,
    Hz50,
    Hz60,
}

impl AntiFlickerValue {
    /// `None` for `Auto`, which is never an effective value.
    pub fn from_mode(mode: AntiFlickerMode) -> Option<Self> {
        match mode {
            AntiFlickerMode::Off => Some(Self::Off),
            AntiFlickerMode::Hz50 => Some(Self::Hz50),
            AntiFlickerMode::Hz60 => Some(Self::Hz60),
            AntiFlickerMode::Auto => None,
        }
    }
}
