// ── GPS ──
//
// Tracks the satellite fix and the vehicle location. The last known
// location outlives the session, so the component stays published after a
// disconnect.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::component::Component;
use crate::device::{DeviceContext, FeatureController};
use crate::error::RejectedEvent;
use crate::event::{Event, PilotingEvent};
use crate::model::Location;

/// Coordinate value the device reports while the position is unknown.
const UNKNOWN_COORDINATE: f64 = 500.0;

/// Published GPS snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsState {
    pub fixed: bool,
    pub satellites: u8,
    pub location: Option<Location>,
}

/// GPS feature controller.
pub struct GpsController {
    state: GpsState,
    component: Component<GpsState>,
}

impl GpsController {
    pub(crate) fn new(context: Arc<DeviceContext>) -> Self {
        Self {
            state: GpsState::default(),
            component: Component::new(Arc::clone(context.components()), 0),
        }
    }

    pub fn state(&self) -> &GpsState {
        &self.state
    }

    fn on_position(&mut self, latitude: f64, longitude: f64, altitude: f64) {
        let unknown = [latitude, longitude, altitude].contains(&UNKNOWN_COORDINATE);
        if unknown {
            return;
        }
        self.state.location = Some(Location {
            latitude,
            longitude,
            altitude,
            timestamp: Utc::now(),
        });
    }
}

impl FeatureController for GpsController {
    fn on_connected(&mut self) {
        self.component.publish(self.state.clone());
    }

    fn on_disconnected(&mut self) {
        self.state.fixed = false;
        self.state.satellites = 0;
        self.component.notify_updated(self.state.clone());
    }

    fn on_forgetting(&mut self) {
        self.component.unpublish();
    }

    fn on_event(&mut self, event: &Event) -> Result<(), RejectedEvent> {
        let Event::Piloting(event) = event else {
            return Ok(());
        };
        match *event {
            PilotingEvent::PositionChanged {
                latitude,
                longitude,
                altitude,
            } => self.on_position(latitude, longitude, altitude),
            PilotingEvent::GpsFixChanged { fixed } => self.state.fixed = fixed != 0,
            PilotingEvent::SatelliteCount { count } => self.state.satellites = count,
            _ => return Ok(()),
        }
        debug!(fixed = self.state.fixed, satellites = self.state.satellites, "gps updated");
        self.component.notify_updated(self.state.clone());
        Ok(())
    }
}

impl std::fmt::Debug for GpsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpsController")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::CommandQueue;
    use crate::config::ControllerConfig;
    use crate::device::Device;

    fn position(latitude: f64, longitude: f64, altitude: f64) -> Event {
        Event::Piloting(PilotingEvent::PositionChanged {
            latitude,
            longitude,
            altitude,
        })
    }

    #[test]
    fn location_survives_disconnect() {
        let (queue, _rx) = CommandQueue::new();
        let mut device = Device::new("gps", Arc::new(queue), None, ControllerConfig::default());
        device.connecting().unwrap();
        device.connected().unwrap();

        device.dispatch(&Event::Piloting(PilotingEvent::GpsFixChanged { fixed: 1 }));
        device.dispatch(&Event::Piloting(PilotingEvent::SatelliteCount { count: 9 }));
        device.dispatch(&position(48.87, 2.36, 35.0));
        device.dispatch(&position(UNKNOWN_COORDINATE, UNKNOWN_COORDINATE, UNKNOWN_COORDINATE));

        let gps = device.components().get::<GpsState>(0).unwrap();
        assert!(gps.fixed);
        assert_eq!(gps.satellites, 9);
        assert_eq!(gps.location.unwrap().latitude, 48.87);

        device.disconnected().unwrap();
        let gps = device.components().get::<GpsState>(0).unwrap();
        assert!(!gps.fixed);
        assert_eq!(gps.satellites, 0);
        assert_eq!(gps.location.unwrap().altitude, 35.0);
    }
}
