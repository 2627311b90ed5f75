//! Feature-controller layer between a vehicle protocol session and its
//! consumers.
//!
//! Every hardware capability is owned by a controller that turns inbound
//! protocol events into a typed, persistent, observable model and turns
//! user requests into the fewest commands that reach it:
//!
//! - **[`Device`]**: owns the controllers of one remote device and drives
//!   them through the [`ConnectionState`] machine. Inbound events enter via
//!   [`Device::dispatch`].
//!
//! - **[`Setting`]**: the synchronization primitive. Validates a request
//!   against a domain discovered at runtime, falls back to the last request
//!   or confirmed value, and sends only what the device has not confirmed.
//!
//! - **[`ComponentStore`]**: per-device registry of published snapshots
//!   ([`CameraState`], [`Alarms`], [`AntiFlickerState`], [`GpsState`]),
//!   observed through [`ComponentStream`].
//!
//! - **[`CommandChannel`]**: outbound seam. Acknowledged commands are sent
//!   once; non-acknowledged ones are produced by polled [`NoAckEncoder`]s
//!   such as the zoom encoder.
//!
//! - **[`PersistentStore`]**: JSON document holding device capabilities and
//!   user presets across sessions.

pub mod alarms;
pub mod anti_flicker;
pub mod camera;
pub mod command;
pub mod component;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod gps;
pub mod list;
pub mod model;
pub mod setting;
pub mod store;
pub(crate) mod wire;

// ── Primary re-exports ──────────────────────────────────────────────
pub use alarms::{Alarms, AlarmsController};
pub use anti_flicker::{AntiFlickerController, AntiFlickerState, CountryLocator};
pub use camera::{CameraController, CameraState};
pub use command::{Command, CommandChannel, CommandQueue, NoAckEncoder};
pub use component::{ComponentChange, ComponentKey, ComponentKind, ComponentStore, ComponentStream};
pub use config::ControllerConfig;
pub use device::{ConnectionState, Device, DeviceBuilder, FeatureController};
pub use error::{CoreError, RejectedEvent, StoreError};
pub use event::Event;
pub use gps::GpsState;
pub use list::{KeyedList, ListAssembler, ListFlags};
pub use setting::{Applied, Setting};
pub use store::{Dictionary, PersistentStore, StorageEntry};
