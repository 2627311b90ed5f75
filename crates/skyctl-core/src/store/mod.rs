// ── Persistent store ──
//
// One JSON document per application, split into per-device scopes:
// `devices/<uid>` holds what was discovered about the device (capabilities,
// camera models), `presets/<uid>` holds what the user wants it to be.
// Controllers see the document through `Dictionary` handles rooted at
// their own key path and never touch the file directly.

mod entry;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::StoreError;

pub use entry::StorageEntry;

const DEVICES_KEY: &str = "devices";
const PRESETS_KEY: &str = "presets";

type Document = Map<String, Value>;

/// Shared handle on the persisted document.
///
/// Cheaply cloneable; every clone and every [`Dictionary`] derived from it
/// see the same content.
#[derive(Clone)]
pub struct PersistentStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    document: Mutex<Document>,
    path: Option<PathBuf>,
}

impl PersistentStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_document(Document::new(), None)
    }

    /// Opens a file-backed store. A missing file starts empty; a corrupt
    /// one is treated as "no prior data" and overwritten on next commit.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Document>(&bytes) {
                Ok(document) => document,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "persisted store is corrupt, starting empty");
                    Document::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Document::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(path = %path.display(), "opened persistent store");
        Ok(Self::with_document(document, Some(path)))
    }

    fn with_document(document: Document, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                document: Mutex::new(document),
                path,
            }),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Scope for capabilities discovered on device `uid`.
    pub fn device_dictionary(&self, uid: &str) -> Dictionary {
        Dictionary::new(self.clone(), vec![DEVICES_KEY.to_owned(), uid.to_owned()])
    }

    /// Scope for user presets applied to device `uid`.
    pub fn preset_dictionary(&self, uid: &str) -> Dictionary {
        Dictionary::new(self.clone(), vec![PRESETS_KEY.to_owned(), uid.to_owned()])
    }

    /// Writes the document to the backing file. No-op for in-memory stores.
    pub fn commit(&self) -> Result<(), StoreError> {
        let Some(path) = self.inner.path.as_ref() else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&*self.document())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, bytes).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })
    }

    fn document(&self) -> MutexGuard<'_, Document> {
        self.inner
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

// ── Dictionary ───────────────────────────────────────────────────────

/// A hierarchical scope inside the persistent store.
#[derive(Clone)]
pub struct Dictionary {
    store: PersistentStore,
    path: Arc<[String]>,
}

impl Dictionary {
    fn new(store: PersistentStore, path: Vec<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Nested scope under `key`.
    pub fn dictionary(&self, key: &str) -> Dictionary {
        let mut path = self.path.to_vec();
        path.push(key.to_owned());
        Dictionary::new(self.store.clone(), path)
    }

    /// `true` if nothing was ever stored in this scope, as opposed to a
    /// scope that exists but happens to be empty.
    pub fn is_new(&self) -> bool {
        node(&self.store.document(), &self.path).is_none()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        node(&self.store.document(), &self.path)?.get(key).cloned()
    }

    pub fn put(&self, key: &str, value: Value) -> &Self {
        if let Some(map) = node_mut(&mut self.store.document(), &self.path) {
            map.insert(key.to_owned(), value);
        }
        self
    }

    pub fn remove(&self, key: &str) -> &Self {
        if let Some(map) = existing_node_mut(&mut self.store.document(), &self.path) {
            map.remove(key);
        }
        self
    }

    /// Keys stored directly in this scope.
    pub fn keys(&self) -> Vec<String> {
        node(&self.store.document(), &self.path)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes the whole scope; it reads as new afterwards.
    pub fn clear(&self) -> &Self {
        let mut document = self.store.document();
        match self.path.split_last() {
            Some((last, parent)) => {
                if let Some(map) = existing_node_mut(&mut document, parent) {
                    map.remove(last);
                }
            }
            None => document.clear(),
        }
        self
    }

    pub fn commit(&self) -> Result<(), StoreError> {
        self.store.commit()
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dictionary").field(&self.path.join("/")).finish()
    }
}

// ── Document navigation ──────────────────────────────────────────────

fn node<'a>(root: &'a Document, path: &[String]) -> Option<&'a Document> {
    path.iter()
        .try_fold(root, |map, key| map.get(key).and_then(Value::as_object))
}

fn existing_node_mut<'a>(root: &'a mut Document, path: &[String]) -> Option<&'a mut Document> {
    path.iter()
        .try_fold(root, |map, key| map.get_mut(key).and_then(Value::as_object_mut))
}

/// Walks to `path`, creating missing scopes. Non-object values found on
/// the way are replaced, which only happens with corrupt documents.
fn node_mut<'a>(root: &'a mut Document, path: &[String]) -> Option<&'a mut Document> {
    path.iter().try_fold(root, |map, key| {
        let entry = map
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        entry.as_object_mut()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn new_scope_until_first_write() {
        let store = PersistentStore::in_memory();
        let dict = store.device_dictionary("drone-1").dictionary("camera0");
        assert!(dict.is_new());

        dict.put("model", json!("MAIN"));
        assert!(!dict.is_new());
        assert_eq!(dict.get("model"), Some(json!("MAIN")));
    }

    #[test]
    fn device_and_preset_scopes_are_separate() {
        let store = PersistentStore::in_memory();
        store.device_dictionary("d").put("k", json!(1));
        assert!(store.preset_dictionary("d").get("k").is_none());
        assert!(store.device_dictionary("other").is_new());
    }

    #[test]
    fn keys_list_direct_children() {
        let store = PersistentStore::in_memory();
        let device = store.device_dictionary("d");
        device.dictionary("camera").put("model", json!("MAIN"));
        device.dictionary("camera1").put("model", json!("THERMAL"));
        device.put("antiFlicker", json!({}));

        let mut keys = device.keys();
        keys.sort();
        assert_eq!(keys, vec!["antiFlicker", "camera", "camera1"]);
    }

    #[test]
    fn clear_makes_scope_new_again() {
        let store = PersistentStore::in_memory();
        let dict = store.device_dictionary("d").dictionary("camera0");
        dict.put("a", json!(true));
        dict.clear();
        assert!(dict.is_new());
        assert!(!store.device_dictionary("d").is_new());
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = PersistentStore::open(&path).unwrap();
        let dict = store.preset_dictionary("d");
        dict.put("mode", json!("PHOTO"));
        dict.commit().unwrap();

        let reopened = PersistentStore::open(&path).unwrap();
        assert_eq!(reopened.preset_dictionary("d").get("mode"), Some(json!("PHOTO")));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = PersistentStore::open(&path).unwrap();
        assert!(store.device_dictionary("d").is_new());
    }
}
