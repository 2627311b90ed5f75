// ── Settings synchronization ──
//
// A `Setting` reconciles what the user asked for with what the device
// confirmed, against a supported domain that is discovered at runtime.
// Every controller funnels its setters and preset replays through
// `Setting::apply` (or `resolve` + `commit` for settings spread over
// several fields), so the validate → fallback → diff → maybe-send
// contract is implemented exactly once.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ── Domains ──────────────────────────────────────────────────────────

/// The set of values a setting currently accepts.
pub trait Domain<T> {
    /// `true` while nothing is supported (typically before discovery).
    fn is_empty(&self) -> bool;

    fn contains(&self, value: &T) -> bool;

    /// Maps a candidate onto the domain: the candidate itself if it is a
    /// member, otherwise a deterministic member. `None` iff the domain is
    /// empty, or the domain has no natural default and no candidate was
    /// given.
    fn fit(&self, candidate: Option<T>) -> Option<T>;
}

/// Enum-valued settings: any supported value, falling back to the first
/// in iteration order.
impl<T: Ord + Clone> Domain<T> for BTreeSet<T> {
    fn is_empty(&self) -> bool {
        BTreeSet::is_empty(self)
    }

    fn contains(&self, value: &T) -> bool {
        BTreeSet::contains(self, value)
    }

    fn fit(&self, candidate: Option<T>) -> Option<T> {
        match candidate {
            Some(value) if BTreeSet::contains(self, &value) => Some(value),
            _ => self.first().cloned(),
        }
    }
}

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    /// Builds bounds, `None` if `min > max`.
    pub fn new(min: T, max: T) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }
}

/// Range-valued settings: unknown bounds mean an empty domain; values are
/// clamped into known bounds, absent values start at the lower bound.
impl<T: PartialOrd + Copy> Domain<T> for Option<Bounds<T>> {
    fn is_empty(&self) -> bool {
        self.is_none()
    }

    fn contains(&self, value: &T) -> bool {
        self.is_some_and(|bounds| bounds.min <= *value && *value <= bounds.max)
    }

    fn fit(&self, candidate: Option<T>) -> Option<T> {
        let bounds = self.as_ref()?;
        Some(candidate.map_or(bounds.min, |value| bounds.clamp(value)))
    }
}

/// Settings without a discovered domain, such as on/off toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unconstrained;

impl<T> Domain<T> for Unconstrained {
    fn is_empty(&self) -> bool {
        false
    }

    fn contains(&self, _value: &T) -> bool {
        true
    }

    fn fit(&self, candidate: Option<T>) -> Option<T> {
        candidate
    }
}

// ── Setting ──────────────────────────────────────────────────────────

/// Outcome of applying a request to a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The domain is empty or no value could be derived; nothing changed.
    Rejected,
    /// The value was applied locally but no command was needed (already
    /// confirmed by the device) or could be sent (offline).
    Unchanged,
    /// A command was handed to the channel; the setting is updating.
    Sent,
}

impl Applied {
    pub fn is_sent(self) -> bool {
        self == Self::Sent
    }
}

/// A synchronized, user-desired versus device-confirmed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting<T, D = BTreeSet<T>> {
    domain: D,
    value: Option<T>,
    confirmed: Option<T>,
    requested: Option<T>,
    updating: bool,
}

impl<T, D: Default> Default for Setting<T, D> {
    fn default() -> Self {
        Self {
            domain: D::default(),
            value: None,
            confirmed: None,
            requested: None,
            updating: false,
        }
    }
}

impl<T: Clone + PartialEq, D: Domain<T>> Setting<T, D> {
    pub fn new(domain: D) -> Self {
        Self {
            domain,
            value: None,
            confirmed: None,
            requested: None,
            updating: false,
        }
    }

    // ── Observer view ────────────────────────────────────────────────

    /// Externally visible value.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn supported(&self) -> &D {
        &self.domain
    }

    /// `true` between a sent command and its confirmation.
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Last value confirmed by the device.
    pub fn confirmed(&self) -> Option<&T> {
        self.confirmed.as_ref()
    }

    // ── Controller side ──────────────────────────────────────────────

    pub fn set_domain(&mut self, domain: D) {
        self.domain = domain;
    }

    /// Validates a request without touching the setting: falls back to the
    /// last request, then to the confirmed value, then fits the result
    /// into the domain.
    pub fn resolve(&self, requested: Option<T>) -> Option<T> {
        if self.domain.is_empty() {
            return None;
        }
        self.domain.fit(self.fallback(requested))
    }

    /// The request, else the last request, else the confirmed value,
    /// without consulting the domain. For fields the chosen mode ignores.
    pub fn fallback(&self, requested: Option<T>) -> Option<T> {
        requested
            .or_else(|| self.requested.clone())
            .or_else(|| self.confirmed.clone())
    }

    /// `true` if `value` is not what the device last confirmed.
    pub fn differs(&self, value: &T) -> bool {
        self.confirmed.as_ref() != Some(value)
    }

    /// Records a validated value as requested and visible.
    pub fn commit(&mut self, value: T, sent: bool) {
        self.requested = Some(value.clone());
        self.value = Some(value);
        if sent {
            self.updating = true;
        }
    }

    /// Runs the full validate → fallback → diff → maybe-send routine.
    ///
    /// `send` is only invoked when the validated value differs from the
    /// device-confirmed one, and reports whether the command went out.
    pub fn apply(&mut self, requested: Option<T>, send: impl FnOnce(&T) -> bool) -> Applied {
        let Some(value) = self.resolve(requested) else {
            return Applied::Rejected;
        };
        let sent = self.differs(&value) && send(&value);
        self.commit(value, sent);
        if sent { Applied::Sent } else { Applied::Unchanged }
    }

    /// Records a device-confirmed value. The visible value follows only
    /// once the connection is complete, so a preset replay is not
    /// overwritten by the initial state dump.
    pub fn confirm(&mut self, value: T, connected: bool) {
        self.confirmed = Some(value.clone());
        if connected {
            self.value = Some(value);
            self.updating = false;
        }
    }

    /// Abandons the pending confirmation (disconnect).
    pub fn cancel_rollback(&mut self) {
        self.updating = false;
    }
}

/// Boolean toggles that become supported on first report.
pub type Toggle = Setting<bool, Unconstrained>;

/// Numeric settings bounded by a discovered range.
pub type RangeSetting<T> = Setting<T, Option<Bounds<T>>>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Mode {
        Recording,
        Photo,
    }

    fn modes(values: &[Mode]) -> BTreeSet<Mode> {
        values.iter().copied().collect()
    }

    #[test]
    fn empty_domain_rejects_without_sending() {
        let mut setting: Setting<Mode> = Setting::default();
        let sent = Cell::new(false);
        let outcome = setting.apply(Some(Mode::Photo), |_| {
            sent.set(true);
            true
        });
        assert_eq!(outcome, Applied::Rejected);
        assert!(!sent.get());
        assert_eq!(setting.value(), None);
    }

    #[test]
    fn unsupported_request_falls_back_to_first_member() {
        let setting = Setting::new(modes(&[Mode::Photo]));
        assert_eq!(setting.resolve(Some(Mode::Recording)), Some(Mode::Photo));
    }

    #[test]
    fn absent_request_falls_back_to_last_request_then_confirmed() {
        let mut setting = Setting::new(modes(&[Mode::Recording, Mode::Photo]));
        setting.confirm(Mode::Photo, true);
        assert_eq!(setting.resolve(None), Some(Mode::Photo));

        setting.commit(Mode::Recording, false);
        assert_eq!(setting.resolve(None), Some(Mode::Recording));
    }

    #[test]
    fn validated_value_is_always_a_domain_member() {
        let domains = [
            modes(&[Mode::Photo]),
            modes(&[Mode::Recording]),
            modes(&[Mode::Recording, Mode::Photo]),
        ];
        for domain in domains {
            let setting = Setting::new(domain.clone());
            for request in [None, Some(Mode::Recording), Some(Mode::Photo)] {
                let value = setting.resolve(request).unwrap();
                assert!(domain.contains(&value), "{value:?} not in {domain:?}");
            }
        }

        let ranged: RangeSetting<f64> = Setting::new(Bounds::new(1.0, 3.0));
        for request in [None, Some(-5.0), Some(2.5), Some(99.0)] {
            let value = ranged.resolve(request).unwrap();
            assert!((1.0..=3.0).contains(&value));
        }
    }

    #[test]
    fn sends_only_when_value_differs_from_confirmed() {
        let mut setting = Setting::new(modes(&[Mode::Recording, Mode::Photo]));
        setting.confirm(Mode::Photo, true);

        let outcome = setting.apply(Some(Mode::Photo), |_| panic!("must not send"));
        assert_eq!(outcome, Applied::Unchanged);
        assert!(!setting.is_updating());

        let outcome = setting.apply(Some(Mode::Recording), |_| true);
        assert_eq!(outcome, Applied::Sent);
        assert!(setting.is_updating());
        assert_eq!(setting.value(), Some(&Mode::Recording));
    }

    #[test]
    fn failed_send_still_applies_optimistically() {
        let mut setting = Setting::new(modes(&[Mode::Recording, Mode::Photo]));
        let outcome = setting.apply(Some(Mode::Photo), |_| false);
        assert_eq!(outcome, Applied::Unchanged);
        assert_eq!(setting.value(), Some(&Mode::Photo));
        assert!(!setting.is_updating());
    }

    #[test]
    fn confirmation_clears_updating_only_when_connected() {
        let mut setting = Setting::new(modes(&[Mode::Recording, Mode::Photo]));
        setting.apply(Some(Mode::Recording), |_| true);

        setting.confirm(Mode::Photo, false);
        assert!(setting.is_updating());
        assert_eq!(setting.value(), Some(&Mode::Recording));
        assert_eq!(setting.confirmed(), Some(&Mode::Photo));

        setting.confirm(Mode::Recording, true);
        assert!(!setting.is_updating());
        assert_eq!(setting.value(), Some(&Mode::Recording));
    }

    #[test]
    fn range_clamps_and_starts_at_lower_bound() {
        let setting: RangeSetting<i32> = Setting::new(Bounds::new(-2, 2));
        assert_eq!(setting.resolve(Some(7)), Some(2));
        assert_eq!(setting.resolve(None), Some(-2));
        assert!(Bounds::new(3, 1).is_none());
    }

    #[test]
    fn toggle_without_history_is_rejected() {
        let mut toggle = Toggle::default();
        assert_eq!(toggle.apply(None, |_| true), Applied::Rejected);
        assert_eq!(toggle.apply(Some(true), |_| true), Applied::Sent);
    }
}
