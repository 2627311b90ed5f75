use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::Dictionary;

/// A typed key inside a [`Dictionary`].
///
/// Every accessor takes an optional dictionary: controllers running
/// without offline settings have none, and then loads yield `None` and
/// writes are dropped.
#[derive(Debug, Clone, Copy)]
pub struct StorageEntry<T> {
    key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StorageEntry<T> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub const fn key(&self) -> &'static str {
        self.key
    }
}

impl<T: Serialize + DeserializeOwned> StorageEntry<T> {
    /// Reads the value. Absent and undecodable values both read as `None`.
    pub fn load(&self, dict: Option<&Dictionary>) -> Option<T> {
        let value = dict?.get(self.key)?;
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = self.key, ?dict, error = %err, "ignoring undecodable stored value");
                None
            }
        }
    }

    /// Writes the value and commits the store.
    pub fn save(&self, dict: Option<&Dictionary>, value: &T) {
        let Some(dict) = dict else { return };
        match serde_json::to_value(value) {
            Ok(json) => {
                dict.put(self.key, json);
                commit(dict);
            }
            Err(err) => warn!(key = self.key, error = %err, "cannot encode value for storage"),
        }
    }

    /// Deletes the value and commits the store.
    pub fn remove(&self, dict: Option<&Dictionary>) {
        let Some(dict) = dict else { return };
        dict.remove(self.key);
        commit(dict);
    }
}

fn commit(dict: &Dictionary) {
    if let Err(err) = dict.commit() {
        warn!(?dict, error = %err, "failed to commit persistent store");
    }
}
