use serde::{Deserialize, Serialize};

use crate::wire::wire_enum;

/// Every alarm the alarms component reports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmKind {
    Power,
    BatteryTooCold,
    BatteryTooHot,
    MotorCutOut,
    UserEmergency,
    MagnetometerPerturbation,
    MagnetometerLowEarthField,
    StrongWind,
    StrongVibrations,
    HoveringDifficultiesNoGpsTooDark,
    HoveringDifficultiesNoGpsTooHigh,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmLevel {
    #[default]
    Off,
    Warning,
    Critical,
}

wire_enum! {
    /// Battery alert kind, the key of the streamed alert list.
    pub enum BatteryAlert {
        PowerLevel = 0,
        TooCold = 1,
        TooHot = 2,
    }
}

impl BatteryAlert {
    pub fn alarm(self) -> AlarmKind {
        match self {
            Self::PowerLevel => AlarmKind::Power,
            Self::TooCold => AlarmKind::BatteryTooCold,
            Self::TooHot => AlarmKind::BatteryTooHot,
        }
    }
}

wire_enum! {
    /// Severity carried by battery alerts.
    pub enum AlertLevel {
        None = 0,
        Warning = 1,
        Critical = 2,
    }
}

impl From<AlertLevel> for AlarmLevel {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::None => Self::Off,
            AlertLevel::Warning => Self::Warning,
            AlertLevel::Critical => Self::Critical,
        }
    }
}

wire_enum! {
    /// Piloting alert state. Exactly one is active at a time.
    pub enum PilotingAlert {
        None = 0,
        User = 1,
        CutOut = 2,
        CriticalBattery = 3,
        LowBattery = 4,
        TooMuchAngle = 5,
        AlmostEmptyBattery = 6,
        MagnetoPerturbation = 7,
        MagnetoLowEarthField = 8,
    }
}

wire_enum! {
    /// Three-level condition used by wind and vibration reports.
    pub enum ConditionLevel {
        Ok = 0,
        Warning = 1,
        Critical = 2,
    }
}

impl From<ConditionLevel> for AlarmLevel {
    fn from(level: ConditionLevel) -> Self {
        match level {
            ConditionLevel::Ok => Self::Off,
            ConditionLevel::Warning => Self::Warning,
            ConditionLevel::Critical => Self::Critical,
        }
    }
}

wire_enum! {
    pub enum FlyingState {
        Landed = 0,
        TakingOff = 1,
        Hovering = 2,
        Flying = 3,
        Landing = 4,
        Emergency = 5,
        UserTakeoff = 6,
        MotorRamping = 7,
        EmergencyLanding = 8,
    }
}

impl FlyingState {
    /// Airborne and holding or moving, as opposed to transitioning.
    pub fn is_flying(self) -> bool {
        matches!(self, Self::Hovering | Self::Flying)
    }
}
