// ── Command API ──
//
// Every outbound request is a `Command`. Acknowledged commands go through
// `CommandChannel::send` once and are never retried; continuous controls
// register a `NoAckEncoder` that the transport polls on its own timer.

pub mod zoom;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::model::{
    AntiFlickerMode, BracketingValue, BurstValue, CameraMode, EvCompensation, ExposureMode,
    Framerate, HyperlapseValue, IsoSensitivity, MeteringMode, PhotoFileFormat, PhotoFormat,
    PhotoMode, RecordingMode, Resolution, ShutterSpeed, Style, WhiteBalanceMode,
    WhiteBalanceTemperature, ZoomControlMode,
};

pub use zoom::ZoomControlEncoder;

/// All requests a controller can send to the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Camera { cam_id: u8, command: CameraCommand },
    SetAntiFlickerMode(AntiFlickerMode),
}

/// Camera feature requests.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraCommand {
    // ── Settings ─────────────────────────────────────────────────────
    SetMode(CameraMode),
    SetPhotoMode {
        mode: PhotoMode,
        format: PhotoFormat,
        file_format: PhotoFileFormat,
        burst: BurstValue,
        bracketing: BracketingValue,
        /// Time-lapse or GPS-lapse interval, depending on `mode`.
        capture_interval: f64,
    },
    SetRecordingMode {
        mode: RecordingMode,
        resolution: Resolution,
        framerate: Framerate,
        hyperlapse: HyperlapseValue,
    },
    SetEvCompensation(EvCompensation),
    SetExposureSettings {
        mode: ExposureMode,
        shutter_speed: ShutterSpeed,
        iso: IsoSensitivity,
        max_iso: IsoSensitivity,
        metering_mode: MeteringMode,
    },
    SetWhiteBalance {
        mode: WhiteBalanceMode,
        temperature: WhiteBalanceTemperature,
    },
    SetWhiteBalanceLock(bool),
    SetStyle(Style),
    SetStyleParams {
        saturation: i32,
        contrast: i32,
        sharpness: i32,
    },
    SetAutoHdr(bool),
    SetAutoRecord(bool),
    SetMaxZoomSpeed(f64),
    SetZoomVelocityQualityDegradation(bool),

    // ── Exposure lock ────────────────────────────────────────────────
    UnlockExposure,
    LockExposure,
    LockExposureOnRegion { center_x: f64, center_y: f64 },

    // ── Continuous control (no-ack) ──────────────────────────────────
    SetZoomTarget { mode: ZoomControlMode, target: f64 },

    // ── Actions ──────────────────────────────────────────────────────
    TakePhoto,
    StopPhoto,
    StartRecording,
    StopRecording,
}

/// Produces the command to repeat on the non-acknowledged channel.
pub trait NoAckEncoder: Send + Sync {
    /// Called on every transport tick. `None` means nothing to send now.
    fn encode(&self) -> Option<Command>;
}

/// Outbound side of a device connection.
pub trait CommandChannel: Send + Sync {
    /// Hands `command` to the acknowledged channel. Returns `false` if no
    /// live connection accepted it.
    fn send(&self, command: Command) -> bool;

    fn register_no_ack(&self, encoder: Arc<dyn NoAckEncoder>);

    fn unregister_no_ack(&self, encoder: &Arc<dyn NoAckEncoder>);
}

// ── Queue implementation ─────────────────────────────────────────────

/// `CommandChannel` backed by an unbounded mpsc queue plus a registry of
/// polled encoders. The transport drains the receiver and calls
/// [`CommandQueue::poll_no_ack`] on its timer.
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<Command>,
    encoders: Mutex<Vec<Arc<dyn NoAckEncoder>>>,
}

impl CommandQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            encoders: Mutex::new(Vec::new()),
        };
        (queue, rx)
    }

    /// Commands every registered encoder emits for this tick.
    pub fn poll_no_ack(&self) -> Vec<Command> {
        self.encoders()
            .iter()
            .filter_map(|encoder| encoder.encode())
            .collect()
    }

    pub fn no_ack_count(&self) -> usize {
        self.encoders().len()
    }

    fn encoders(&self) -> MutexGuard<'_, Vec<Arc<dyn NoAckEncoder>>> {
        self.encoders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandChannel for CommandQueue {
    fn send(&self, command: Command) -> bool {
        debug!(?command, "sending command");
        self.tx.send(command).is_ok()
    }

    fn register_no_ack(&self, encoder: Arc<dyn NoAckEncoder>) {
        let mut encoders = self.encoders();
        if !encoders.iter().any(|known| Arc::ptr_eq(known, &encoder)) {
            encoders.push(encoder);
        }
    }

    fn unregister_no_ack(&self, encoder: &Arc<dyn NoAckEncoder>) {
        self.encoders().retain(|known| !Arc::ptr_eq(known, encoder));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Fixed(Option<Command>);

    impl NoAckEncoder for Fixed {
        fn encode(&self) -> Option<Command> {
            self.0.clone()
        }
    }

    #[test]
    fn acknowledged_commands_reach_the_receiver() {
        let (queue, mut rx) = CommandQueue::new();
        assert!(queue.send(Command::SetAntiFlickerMode(AntiFlickerMode::Hz50)));
        assert_eq!(
            rx.try_recv().unwrap(),
            Command::SetAntiFlickerMode(AntiFlickerMode::Hz50)
        );
    }

    #[test]
    fn send_fails_once_receiver_is_gone() {
        let (queue, rx) = CommandQueue::new();
        drop(rx);
        assert!(!queue.send(Command::SetAntiFlickerMode(AntiFlickerMode::Off)));
    }

    #[test]
    fn poll_collects_registered_encoders_once_each() {
        let (queue, _rx) = CommandQueue::new();
        let stop = Command::Camera {
            cam_id: 0,
            command: CameraCommand::StopPhoto,
        };
        let active: Arc<dyn NoAckEncoder> = Arc::new(Fixed(Some(stop.clone())));
        let idle: Arc<dyn NoAckEncoder> = Arc::new(Fixed(None));

        queue.register_no_ack(Arc::clone(&active));
        queue.register_no_ack(Arc::clone(&active));
        queue.register_no_ack(Arc::clone(&idle));
        assert_eq!(queue.no_ack_count(), 2);
        assert_eq!(queue.poll_no_ack(), vec![stop]);

        queue.unregister_no_ack(&active);
        assert!(queue.poll_no_ack().is_empty());
    }
}
