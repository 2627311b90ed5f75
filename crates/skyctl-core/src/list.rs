// ── Streamed list decoding ──
//
// Some collections are not sent as one framed message but as a sequence of
// events, each carrying one element and a set of list flags. `ListAssembler`
// rebuilds append-only lists per entity id; `KeyedList` maintains a
// long-lived map that accepts both full replacement and incremental
// add/remove.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

/// Flags attached to one element of a streamed list.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ListFlags(u8);

impl ListFlags {
    /// The list is empty; no element accompanies this event.
    pub const EMPTY: Self = Self(1 << 0);
    /// First element of a new transmission.
    pub const FIRST: Self = Self(1 << 1);
    /// Last element of the transmission.
    pub const LAST: Self = Self(1 << 2);
    /// Remove the element matching this event's key.
    pub const REMOVE: Self = Self(1 << 3);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ListFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ListFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::EMPTY, "EMPTY"),
            (Self::FIRST, "FIRST"),
            (Self::LAST, "LAST"),
            (Self::REMOVE, "REMOVE"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        write!(f, "ListFlags({})", names.join("|"))
    }
}

// ── Append-only lists ────────────────────────────────────────────────

/// Per-entity accumulation buffers for append-only streamed lists.
#[derive(Debug)]
pub struct ListAssembler<K, T> {
    buffers: HashMap<K, Vec<T>>,
}

impl<K: Eq + Hash, T> Default for ListAssembler<K, T> {
    fn default() -> Self {
        Self {
            buffers: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, T> ListAssembler<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one event. Returns the complete list once the transmission
    /// for `id` is finished.
    ///
    /// `item` is ignored when the event carries `EMPTY`.
    pub fn process(&mut self, id: K, flags: ListFlags, item: T) -> Option<Vec<T>> {
        if flags.contains(ListFlags::EMPTY) {
            self.buffers.remove(&id);
            return Some(Vec::new());
        }

        if flags.contains(ListFlags::LAST) {
            let mut items = self
                .buffers
                .remove(&id)
                .filter(|_| !flags.contains(ListFlags::FIRST))
                .unwrap_or_default();
            items.push(item);
            return Some(items);
        }

        // An element without FIRST continues the current buffer, or opens
        // one if the FIRST event was lost.
        let buffer = self.buffers.entry(id).or_default();
        if flags.contains(ListFlags::FIRST) {
            buffer.clear();
        }
        buffer.push(item);
        None
    }

    /// Drops every pending buffer, e.g. when the session ends.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

// ── Keyed maps ───────────────────────────────────────────────────────

/// A long-lived keyed collection fed by streamed events.
///
/// Mutations apply immediately; [`KeyedList::process`] reports when the
/// map reached a delivery point (`LAST` or `EMPTY`).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedList<K: Ord, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for KeyedList<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> KeyedList<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event and returns `true` if the map should now be
    /// delivered to observers.
    ///
    /// `entry` may be `None` for `EMPTY` events, or for events whose value
    /// could not be decoded; the flags are honoured either way.
    pub fn process(&mut self, flags: ListFlags, entry: Option<(K, V)>) -> bool {
        if flags.contains(ListFlags::EMPTY) {
            self.entries.clear();
            return true;
        }

        if let Some((key, value)) = entry {
            if flags.contains(ListFlags::REMOVE) {
                self.entries.remove(&key);
            } else {
                if flags.contains(ListFlags::FIRST) {
                    self.entries.clear();
                }
                self.entries.insert(key, value);
            }
        } else if flags.contains(ListFlags::FIRST) && !flags.contains(ListFlags::REMOVE) {
            self.entries.clear();
        }

        flags.contains(ListFlags::LAST)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &BTreeMap<K, V> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const PLAIN: ListFlags = ListFlags::from_bits(0);

    #[test]
    fn empty_delivers_an_empty_list() {
        let mut lists: ListAssembler<u8, &str> = ListAssembler::new();
        assert_eq!(lists.process(0, ListFlags::EMPTY, "ignored"), Some(vec![]));
        assert_eq!(lists.process(0, ListFlags::LAST, "next"), Some(vec!["next"]));
    }

    #[test]
    fn first_elements_last_round_trip() {
        let mut lists = ListAssembler::new();
        assert_eq!(lists.process(1u8, ListFlags::FIRST, "e1"), None);
        assert_eq!(lists.process(1, PLAIN, "e2"), None);
        assert_eq!(lists.process(1, ListFlags::LAST, "e3"), Some(vec!["e1", "e2", "e3"]));
        assert_eq!(lists.process(1, ListFlags::LAST, "e4"), Some(vec!["e4"]));
    }

    #[test]
    fn single_element_list_uses_first_and_last() {
        let mut lists = ListAssembler::new();
        let flags = ListFlags::FIRST | ListFlags::LAST;
        assert_eq!(lists.process(2u8, flags, 42), Some(vec![42]));
    }

    #[test]
    fn new_transmission_discards_previous_buffer() {
        let mut lists = ListAssembler::new();
        lists.process(0u8, ListFlags::FIRST, "stale");
        lists.process(0, ListFlags::FIRST, "fresh");
        assert_eq!(lists.process(0, ListFlags::LAST, "end"), Some(vec!["fresh", "end"]));
    }

    #[test]
    fn buffers_are_independent_per_entity() {
        let mut lists = ListAssembler::new();
        lists.process(0u8, ListFlags::FIRST, "a0");
        lists.process(1u8, ListFlags::FIRST, "b0");
        assert_eq!(lists.process(1, ListFlags::LAST, "b1"), Some(vec!["b0", "b1"]));
        assert_eq!(lists.process(0, ListFlags::LAST, "a1"), Some(vec!["a0", "a1"]));
    }

    #[test]
    fn keyed_stream_replaces_previous_map() {
        let mut map = KeyedList::new();
        assert!(!map.process(ListFlags::FIRST, Some(("power", 1))));
        assert!(map.process(ListFlags::LAST, Some(("cold", 2))));
        assert_eq!(map.entries().len(), 2);

        assert!(map.process(ListFlags::FIRST | ListFlags::LAST, Some(("hot", 1))));
        assert_eq!(map.entries(), &BTreeMap::from([("hot", 1)]));
    }

    #[test]
    fn keyed_incremental_remove_and_empty() {
        let mut map = KeyedList::new();
        map.process(ListFlags::FIRST | ListFlags::LAST, Some(("a", 1)));
        assert!(!map.process(PLAIN, Some(("b", 2))));
        assert!(map.process(ListFlags::REMOVE | ListFlags::LAST, Some(("a", 0))));
        assert_eq!(map.entries(), &BTreeMap::from([("b", 2)]));

        assert!(map.process(ListFlags::EMPTY, None));
        assert!(map.is_empty());
    }

    #[test]
    fn flags_debug_lists_set_names() {
        let flags = ListFlags::FIRST | ListFlags::LAST;
        assert_eq!(format!("{flags:?}"), "ListFlags(FIRST|LAST)");
    }
}
