// ── Zoom continuous control ──
//
// The zoom target travels on the non-acknowledged channel, so a request is
// repeated on every tick until the device has likely seen it. Velocity
// requests keep streaming as long as they are non-zero; absolute levels
// and a zero velocity stop after `bound` emissions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CameraCommand, Command, NoAckEncoder};
use crate::model::ZoomControlMode;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Target {
    mode: ZoomControlMode,
    target: f64,
}

#[derive(Debug, Default)]
struct EncoderState {
    requested: Option<Target>,
    sent: Option<Target>,
    budget: i32,
}

/// Polled encoder for one camera's zoom target.
#[derive(Debug)]
pub struct ZoomControlEncoder {
    cam_id: u8,
    bound: i32,
    state: Mutex<EncoderState>,
}

impl ZoomControlEncoder {
    pub fn new(cam_id: u8, bound: u16) -> Self {
        Self {
            cam_id,
            bound: i32::from(bound),
            state: Mutex::new(EncoderState::default()),
        }
    }

    /// Records the latest request; the next poll picks it up.
    pub fn control(&self, mode: ZoomControlMode, target: f64) {
        self.state().requested = Some(Target { mode, target });
    }

    /// Stops emitting until the next request.
    pub fn reset(&self) {
        let mut state = self.state();
        state.requested = None;
        state.sent = None;
        state.budget = 0;
    }

    fn state(&self) -> MutexGuard<'_, EncoderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NoAckEncoder for ZoomControlEncoder {
    fn encode(&self) -> Option<Command> {
        let mut state = self.state();
        let requested = state.requested?;

        if state.sent != Some(requested) {
            state.budget = self.bound;
            state.sent = Some(requested);
        }

        let bounded = match requested.mode {
            ZoomControlMode::Level => true,
            ZoomControlMode::Velocity => requested.target == 0.0,
        };
        // Saturates at -1 once exhausted.
        if bounded && state.budget >= 0 {
            state.budget -= 1;
        }
        if state.budget < 0 {
            return None;
        }

        Some(Command::Camera {
            cam_id: self.cam_id,
            command: CameraCommand::SetZoomTarget {
                mode: requested.mode,
                target: requested.target,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn poll_many(encoder: &ZoomControlEncoder, polls: usize) -> Vec<bool> {
        (0..polls).map(|_| encoder.encode().is_some()).collect()
    }

    #[test]
    fn idle_encoder_emits_nothing() {
        let encoder = ZoomControlEncoder::new(0, 10);
        assert!(encoder.encode().is_none());
    }

    #[test]
    fn level_is_repeated_up_to_the_bound() {
        let encoder = ZoomControlEncoder::new(0, 10);
        encoder.control(ZoomControlMode::Level, 0.5);

        let emitted = poll_many(&encoder, 11);
        assert!(emitted[..10].iter().all(|sent| *sent));
        assert!(!emitted[10]);
        assert!(encoder.encode().is_none());
    }

    #[test]
    fn exhausted_budget_stays_put_while_polled() {
        let encoder = ZoomControlEncoder::new(0, 2);
        encoder.control(ZoomControlMode::Level, 1.0);

        assert_eq!(poll_many(&encoder, 1000).iter().filter(|sent| **sent).count(), 2);
        assert_eq!(encoder.state().budget, -1);
    }

    #[test]
    fn new_request_resets_the_budget() {
        let encoder = ZoomControlEncoder::new(2, 10);
        encoder.control(ZoomControlMode::Level, 0.5);
        poll_many(&encoder, 12);

        encoder.control(ZoomControlMode::Level, 2.0);
        assert_eq!(
            encoder.encode(),
            Some(Command::Camera {
                cam_id: 2,
                command: CameraCommand::SetZoomTarget {
                    mode: ZoomControlMode::Level,
                    target: 2.0,
                },
            })
        );
    }

    #[test]
    fn non_zero_velocity_streams_indefinitely() {
        let encoder = ZoomControlEncoder::new(0, 10);
        encoder.control(ZoomControlMode::Velocity, -0.4);
        assert!(poll_many(&encoder, 50).iter().all(|sent| *sent));

        encoder.control(ZoomControlMode::Velocity, 0.0);
        let emitted = poll_many(&encoder, 11);
        assert_eq!(emitted.iter().filter(|sent| **sent).count(), 10);
    }

    #[test]
    fn reset_silences_the_encoder() {
        let encoder = ZoomControlEncoder::new(0, 10);
        encoder.control(ZoomControlMode::Velocity, 1.0);
        assert!(encoder.encode().is_some());

        encoder.reset();
        assert!(encoder.encode().is_none());

        encoder.control(ZoomControlMode::Velocity, 1.0);
        assert!(encoder.encode().is_some(), "same request after reset is fresh");
    }
}
