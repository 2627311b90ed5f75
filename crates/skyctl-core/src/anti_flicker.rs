// ── Anti-flicker ──
//
// Keeps the camera anti-flicker filter on the requested mode. Devices that
// only offer fixed 50/60 Hz filters get an `Auto` mode emulated from the
// mains frequency of the country the host is located in.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::command::Command;
use crate::component::Component;
use crate::device::{DeviceContext, FeatureController};
use crate::error::RejectedEvent;
use crate::event::{CameraEvent, Event};
use crate::model::{AntiFlickerMode, AntiFlickerValue};
use crate::setting::{Applied, Setting};
use crate::store::{Dictionary, StorageEntry};

const SETTINGS_KEY: &str = "antiFlicker";

const MODE_PRESET: StorageEntry<AntiFlickerMode> = StorageEntry::new("mode");
const SUPPORTED_MODES: StorageEntry<BTreeSet<AntiFlickerMode>> =
    StorageEntry::new("supportedModes");

/// ISO 3166 codes of countries with a 60 Hz mains network.
const COUNTRIES_60HZ: &[&str] = &[
    "AG", "AI", "AS", "AW", "BM", "BR", "BS", "BZ", "CA", "CO", "CR", "CU", "DO", "EC", "FM",
    "GT", "GU", "GY", "HN", "HT", "KN", "KP", "KR", "KY", "LR", "MF", "MS", "MX", "NI", "PA",
    "PE", "PF", "PH", "PR", "PW", "SA", "SR", "SV", "TT", "TW", "US", "VE", "VG", "VI",
];

/// Resolves the country the host currently is in.
pub trait CountryLocator: Send + Sync {
    /// ISO 3166 alpha-2 code, `None` while unknown.
    fn country_code(&self) -> Option<String>;
}

/// Fixed filter matching the mains frequency of `country`.
pub fn mains_frequency(country: &str) -> AntiFlickerMode {
    if COUNTRIES_60HZ.contains(&country.to_ascii_uppercase().as_str()) {
        AntiFlickerMode::Hz60
    } else {
        AntiFlickerMode::Hz50
    }
}

/// Published anti-flicker snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AntiFlickerState {
    pub mode: Setting<AntiFlickerMode>,
    /// Frequency the device actually filters.
    pub value: AntiFlickerValue,
}

/// Anti-flicker feature controller.
pub struct AntiFlickerController {
    context: Arc<DeviceContext>,
    state: AntiFlickerState,
    component: Component<AntiFlickerState>,
    device_dict: Option<Dictionary>,
    presets: Option<Dictionary>,
    connected: bool,
    /// Mode currently in force, as requested or reported.
    mode: Option<AntiFlickerMode>,
    /// Country frequency the emulated `Auto` mode was last applied with.
    location_frequency: Option<AntiFlickerMode>,
    auto_emulation: bool,
    /// Follow location changes: `Auto` is in force under emulation.
    monitoring: bool,
    received_mode: Option<AntiFlickerMode>,
    sent_emulation_mode: Option<AntiFlickerMode>,
}

impl AntiFlickerController {
    pub(crate) fn new(context: Arc<DeviceContext>) -> Self {
        let device_dict = context.device_dictionary(SETTINGS_KEY);
        let presets = context.preset_dictionary(SETTINGS_KEY);
        let component = Component::new(Arc::clone(context.components()), 0);

        let mut controller = Self {
            context,
            state: AntiFlickerState::default(),
            component,
            device_dict,
            presets,
            connected: false,
            mode: None,
            location_frequency: None,
            auto_emulation: false,
            monitoring: false,
            received_mode: None,
            sent_emulation_mode: None,
        };

        if let Some(modes) = SUPPORTED_MODES.load(controller.device_dict.as_ref()) {
            controller.state.mode.set_domain(modes);
        }
        controller.apply_presets();

        if controller.device_dict.as_ref().is_some_and(|dict| !dict.is_new()) {
            controller.component.publish(controller.state.clone());
        }
        controller
    }

    /// Current snapshot, published or not.
    pub fn state(&self) -> &AntiFlickerState {
        &self.state
    }

    /// Whether `Auto` is emulated from the host location.
    pub fn is_auto_emulated(&self) -> bool {
        self.auto_emulation
    }

    /// Requests `mode` and remembers it in the preset.
    pub fn set_mode(&mut self, mode: AntiFlickerMode) -> Applied {
        let outcome = self.apply_mode(Some(mode));
        MODE_PRESET.save(self.presets.as_ref(), &mode);
        self.notify();
        outcome
    }

    /// Re-evaluates the emulated `Auto` mode after the host moved.
    pub fn location_changed(&mut self) {
        if self.monitoring {
            self.apply_mode(Some(AntiFlickerMode::Auto));
            self.notify();
        }
    }

    fn notify(&self) {
        self.component.notify_updated(self.state.clone());
    }

    fn apply_presets(&mut self) {
        self.apply_mode(MODE_PRESET.load(self.presets.as_ref()));
    }

    fn apply_mode(&mut self, requested: Option<AntiFlickerMode>) -> Applied {
        let supported = self.state.mode.supported();
        let Some(mode) = requested.filter(|mode| supported.contains(mode)).or(self.mode) else {
            return Applied::Rejected;
        };

        self.monitoring = mode == AntiFlickerMode::Auto && self.auto_emulation;
        let location_frequency = if self.monitoring {
            self.country_frequency()
        } else {
            None
        };

        let changed = self.mode != Some(mode) || self.location_frequency != location_frequency;
        let sent = changed && self.send_mode(mode, location_frequency);
        debug!(?mode, ?location_frequency, sent, "anti-flicker mode applied");

        self.mode = Some(mode);
        self.location_frequency = location_frequency;
        self.state.mode.commit(mode, sent);
        if sent { Applied::Sent } else { Applied::Unchanged }
    }

    fn send_mode(&mut self, mode: AntiFlickerMode, location_frequency: Option<AntiFlickerMode>) -> bool {
        self.sent_emulation_mode = None;
        let wire_mode = if mode != AntiFlickerMode::Auto || !self.auto_emulation {
            Some(mode)
        } else {
            self.sent_emulation_mode = location_frequency;
            location_frequency
        };

        match wire_mode {
            Some(wire_mode) if Some(wire_mode) != self.received_mode => {
                self.context.send(Command::SetAntiFlickerMode(wire_mode))
            }
            _ => false,
        }
    }

    fn country_frequency(&self) -> Option<AntiFlickerMode> {
        let country = self.context.country_locator()?.country_code()?;
        Some(mains_frequency(&country))
    }

    // ── Events ───────────────────────────────────────────────────────

    fn on_capabilities(&mut self, bits: u64) {
        let mut modes = AntiFlickerMode::from_bitfield(bits);
        self.auto_emulation = !modes.contains(&AntiFlickerMode::Auto)
            && modes.contains(&AntiFlickerMode::Hz50)
            && modes.contains(&AntiFlickerMode::Hz60)
            && self.context.country_locator().is_some();
        if self.auto_emulation {
            modes.insert(AntiFlickerMode::Auto);
        }
        debug!(?modes, auto_emulation = self.auto_emulation, "anti-flicker capabilities");

        SUPPORTED_MODES.save(self.device_dict.as_ref(), &modes);
        self.state.mode.set_domain(modes);
        self.notify();
    }

    fn on_mode(&mut self, mode: u32, value: u32) -> Result<(), RejectedEvent> {
        const EVENT: &str = "anti-flicker mode";
        let mode = AntiFlickerMode::from_wire(mode).ok_or_else(|| RejectedEvent::field(EVENT, "mode"))?;
        let value = AntiFlickerMode::from_wire(value)
            .and_then(AntiFlickerValue::from_mode)
            .ok_or_else(|| RejectedEvent::field(EVENT, "value"))?;

        self.received_mode = Some(mode);
        let reported = if self.sent_emulation_mode == Some(mode) {
            AntiFlickerMode::Auto
        } else {
            mode
        };
        self.mode = Some(reported);
        self.state.mode.confirm(reported, self.connected);
        self.state.value = value;
        self.notify();
        Ok(())
    }
}

impl FeatureController for AntiFlickerController {
    fn on_connecting(&mut self) {
        self.received_mode = None;
        self.sent_emulation_mode = None;
    }

    fn on_connected(&mut self) {
        self.connected = true;
        self.apply_presets();
        self.component.publish(self.state.clone());
    }

    fn on_disconnected(&mut self) {
        self.connected = false;
        self.state.mode.cancel_rollback();
        self.state.value = AntiFlickerValue::Unknown;
        if self.context.config().offline_settings {
            self.notify();
        } else {
            self.monitoring = false;
            self.component.unpublish();
        }
    }

    fn on_forgetting(&mut self) {
        if let Some(dict) = &self.device_dict {
            dict.clear();
            if let Err(err) = dict.commit() {
                warn!(error = %err, "failed to commit cleared anti-flicker data");
            }
        }
        self.monitoring = false;
        self.component.unpublish();
    }

    fn on_preset_change(&mut self) {
        self.presets = self.context.preset_dictionary(SETTINGS_KEY);
        if self.connected {
            self.apply_presets();
        }
        self.notify();
    }

    fn on_event(&mut self, event: &Event) -> Result<(), RejectedEvent> {
        match event {
            Event::Camera(CameraEvent::AntiFlickerCapabilities { modes }) => {
                self.on_capabilities(*modes);
                Ok(())
            }
            Event::Camera(CameraEvent::AntiFlickerMode { mode, value }) => self.on_mode(*mode, *value),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for AntiFlickerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntiFlickerController")
            .field("mode", &self.mode)
            .field("auto_emulation", &self.auto_emulation)
            .field("received_mode", &self.received_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mains_frequency_follows_country_list() {
        assert_eq!(mains_frequency("US"), AntiFlickerMode::Hz60);
        assert_eq!(mains_frequency("br"), AntiFlickerMode::Hz60);
        assert_eq!(mains_frequency("FR"), AntiFlickerMode::Hz50);
        assert_eq!(mains_frequency("JP"), AntiFlickerMode::Hz50);
    }

    #[test]
    fn country_list_is_sorted_without_duplicates() {
        assert!(COUNTRIES_60HZ.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
