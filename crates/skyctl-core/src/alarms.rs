// ── Alarms ──
//
// Folds battery alerts and piloting state reports into one published set
// of alarm levels. Alarms are session data: the set is published on
// connect and withdrawn on disconnect.

use std::collections::BTreeMap;
use std::sync::Arc;

use strum::IntoEnumIterator;
use tracing::debug;

use crate::component::Component;
use crate::device::{DeviceContext, FeatureController};
use crate::error::RejectedEvent;
use crate::event::{BatteryEvent, Event, PilotingEvent};
use crate::list::{KeyedList, ListFlags};
use crate::model::{
    AlarmKind, AlarmLevel, AlertLevel, BatteryAlert, ConditionLevel, FlyingState, PilotingAlert,
};

/// Published alarm set. Every [`AlarmKind`] always has a level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarms {
    levels: BTreeMap<AlarmKind, AlarmLevel>,
}

impl Default for Alarms {
    fn default() -> Self {
        Self {
            levels: AlarmKind::iter().map(|kind| (kind, AlarmLevel::Off)).collect(),
        }
    }
}

impl Alarms {
    pub fn level(&self, kind: AlarmKind) -> AlarmLevel {
        self.levels.get(&kind).copied().unwrap_or_default()
    }

    /// Alarms currently above `Off`.
    pub fn raised(&self) -> impl Iterator<Item = (AlarmKind, AlarmLevel)> + '_ {
        self.levels
            .iter()
            .filter(|(_, level)| **level != AlarmLevel::Off)
            .map(|(kind, level)| (*kind, *level))
    }

    fn set(&mut self, kind: AlarmKind, level: AlarmLevel) {
        self.levels.insert(kind, level);
    }
}

/// Alarms feature controller.
pub struct AlarmsController {
    alarms: Alarms,
    component: Component<Alarms>,
    battery_alerts: KeyedList<BatteryAlert, AlarmLevel>,
    /// Once the battery feature reports alerts, piloting alerts no longer
    /// drive the power alarm.
    battery_supported: bool,
    flying: bool,
    too_dark: bool,
    too_high: bool,
}

impl AlarmsController {
    pub(crate) fn new(context: Arc<DeviceContext>) -> Self {
        Self {
            alarms: Alarms::default(),
            component: Component::new(Arc::clone(context.components()), 0),
            battery_alerts: KeyedList::new(),
            battery_supported: false,
            flying: false,
            too_dark: false,
            too_high: false,
        }
    }

    /// Current alarm set, published or not.
    pub fn alarms(&self) -> &Alarms {
        &self.alarms
    }

    fn notify(&self) {
        self.component.notify_updated(self.alarms.clone());
    }

    // ── Battery ──────────────────────────────────────────────────────

    fn on_battery_alert(
        &mut self,
        event: &'static str,
        alert: Option<u32>,
        level: Option<u32>,
        flags: ListFlags,
    ) -> Result<(), RejectedEvent> {
        self.battery_supported = true;

        let entry = if flags.contains(ListFlags::EMPTY) {
            None
        } else {
            let alert = alert
                .and_then(BatteryAlert::from_wire)
                .ok_or_else(|| RejectedEvent::field(event, "alert"))?;
            let level = if flags.contains(ListFlags::REMOVE) {
                AlarmLevel::Off
            } else {
                level
                    .and_then(AlertLevel::from_wire)
                    .map(AlarmLevel::from)
                    .ok_or_else(|| RejectedEvent::field(event, "level"))?
            };
            Some((alert, level))
        };

        debug!(?entry, flags = ?flags, "battery alert");
        if self.battery_alerts.process(flags, entry) {
            for alert in BatteryAlert::iter() {
                let level = self.battery_alerts.get(&alert).copied().unwrap_or_default();
                self.alarms.set(alert.alarm(), level);
            }
            self.notify();
        }
        Ok(())
    }

    // ── Piloting ─────────────────────────────────────────────────────

    fn on_piloting_event(&mut self, event: &PilotingEvent) -> Result<(), RejectedEvent> {
        let name = piloting_event_name(event);
        match *event {
            PilotingEvent::AlertStateChanged { state } => {
                let alert =
                    PilotingAlert::from_wire(state).ok_or_else(|| RejectedEvent::field(name, "state"))?;
                self.on_piloting_alert(alert);
            }
            PilotingEvent::WindStateChanged { state } => {
                let level =
                    ConditionLevel::from_wire(state).ok_or_else(|| RejectedEvent::field(name, "state"))?;
                self.alarms.set(AlarmKind::StrongWind, level.into());
            }
            PilotingEvent::VibrationLevelChanged { state } => {
                let level =
                    ConditionLevel::from_wire(state).ok_or_else(|| RejectedEvent::field(name, "state"))?;
                self.alarms.set(AlarmKind::StrongVibrations, level.into());
            }
            PilotingEvent::HoveringWarning {
                no_gps_too_dark,
                no_gps_too_high,
            } => {
                self.too_dark = no_gps_too_dark != 0;
                self.too_high = no_gps_too_high != 0;
                self.refresh_hovering();
            }
            PilotingEvent::FlyingStateChanged { state } => {
                let state =
                    FlyingState::from_wire(state).ok_or_else(|| RejectedEvent::field(name, "state"))?;
                self.flying = state.is_flying();
                self.refresh_hovering();
            }
            PilotingEvent::PositionChanged { .. }
            | PilotingEvent::GpsFixChanged { .. }
            | PilotingEvent::SatelliteCount { .. } => return Ok(()),
        }
        self.notify();
        Ok(())
    }

    fn on_piloting_alert(&mut self, alert: PilotingAlert) {
        debug!(?alert, battery_supported = self.battery_supported, "piloting alert");
        let drives_power = !self.battery_supported;
        match alert {
            PilotingAlert::None => {
                if drives_power {
                    self.alarms.set(AlarmKind::Power, AlarmLevel::Off);
                }
                for kind in [
                    AlarmKind::MotorCutOut,
                    AlarmKind::UserEmergency,
                    AlarmKind::MagnetometerPerturbation,
                    AlarmKind::MagnetometerLowEarthField,
                ] {
                    self.alarms.set(kind, AlarmLevel::Off);
                }
            }
            PilotingAlert::User => self.alarms.set(AlarmKind::UserEmergency, AlarmLevel::Critical),
            PilotingAlert::CutOut => self.alarms.set(AlarmKind::MotorCutOut, AlarmLevel::Critical),
            PilotingAlert::CriticalBattery | PilotingAlert::AlmostEmptyBattery => {
                if drives_power {
                    self.alarms.set(AlarmKind::Power, AlarmLevel::Critical);
                }
            }
            PilotingAlert::LowBattery => {
                if drives_power {
                    self.alarms.set(AlarmKind::Power, AlarmLevel::Warning);
                }
            }
            PilotingAlert::TooMuchAngle => {}
            PilotingAlert::MagnetoPerturbation => {
                self.alarms.set(AlarmKind::MagnetometerPerturbation, AlarmLevel::Critical);
            }
            PilotingAlert::MagnetoLowEarthField => {
                self.alarms.set(AlarmKind::MagnetometerLowEarthField, AlarmLevel::Critical);
            }
        }
    }

    /// Hovering difficulties only matter while airborne.
    fn refresh_hovering(&mut self) {
        let level = |present: bool| {
            if present && self.flying {
                AlarmLevel::Warning
            } else {
                AlarmLevel::Off
            }
        };
        let (too_dark, too_high) = (level(self.too_dark), level(self.too_high));
        self.alarms.set(AlarmKind::HoveringDifficultiesNoGpsTooDark, too_dark);
        self.alarms.set(AlarmKind::HoveringDifficultiesNoGpsTooHigh, too_high);
    }
}

fn piloting_event_name(event: &PilotingEvent) -> &'static str {
    match event {
        PilotingEvent::FlyingStateChanged { .. } => "flying state",
        PilotingEvent::AlertStateChanged { .. } => "alert state",
        PilotingEvent::WindStateChanged { .. } => "wind state",
        PilotingEvent::VibrationLevelChanged { .. } => "vibration level",
        PilotingEvent::HoveringWarning { .. } => "hovering warning",
        PilotingEvent::PositionChanged { .. } => "position",
        PilotingEvent::GpsFixChanged { .. } => "gps fix",
        PilotingEvent::SatelliteCount { .. } => "satellite count",
    }
}

impl FeatureController for AlarmsController {
    fn on_connected(&mut self) {
        self.component.publish(self.alarms.clone());
    }

    fn on_disconnected(&mut self) {
        self.alarms = Alarms::default();
        self.battery_alerts.clear();
        self.battery_supported = false;
        self.flying = false;
        self.too_dark = false;
        self.too_high = false;
        self.component.unpublish();
    }

    fn on_forgetting(&mut self) {
        self.component.unpublish();
    }

    fn on_event(&mut self, event: &Event) -> Result<(), RejectedEvent> {
        match event {
            Event::Battery(BatteryEvent::Alert {
                alert,
                level,
                list_flags,
            }) => self.on_battery_alert(
                "battery alert",
                *alert,
                *level,
                ListFlags::from_bits(*list_flags),
            ),
            Event::Piloting(event) => self.on_piloting_event(event),
            Event::Camera(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for AlarmsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmsController")
            .field("alarms", &self.alarms)
            .field("battery_supported", &self.battery_supported)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_set_has_every_kind_off() {
        let alarms = Alarms::default();
        for kind in AlarmKind::iter() {
            assert_eq!(alarms.level(kind), AlarmLevel::Off);
        }
        assert_eq!(alarms.raised().count(), 0);
    }

    #[test]
    fn raised_lists_only_active_alarms() {
        let mut alarms = Alarms::default();
        alarms.set(AlarmKind::StrongWind, AlarmLevel::Warning);
        alarms.set(AlarmKind::MotorCutOut, AlarmLevel::Critical);
        assert_eq!(
            alarms.raised().collect::<Vec<_>>(),
            vec![
                (AlarmKind::MotorCutOut, AlarmLevel::Critical),
                (AlarmKind::StrongWind, AlarmLevel::Warning),
            ]
        );
    }
}
