// ── Published components ──
//
// Controllers expose their state as immutable snapshots in a per-device
// `ComponentStore`. Each published kind is a closed enum variant; lookups
// are typed through the `Published` trait, so consumers never downcast.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures_core::Stream;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::alarms::Alarms;
use crate::anti_flicker::AntiFlickerState;
use crate::camera::CameraState;
use crate::gps::GpsState;

const CHANGE_CAPACITY: usize = 64;

/// Every kind of component a device can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
pub enum ComponentKind {
    Camera,
    Alarms,
    AntiFlicker,
    Gps,
}

/// Identifies one published component. Single-instance kinds use
/// instance 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey {
    pub kind: ComponentKind,
    pub instance: u8,
}

/// Notification broadcast when a component appears or disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentChange {
    Published(ComponentKey),
    Unpublished(ComponentKey),
}

/// A snapshot type that can be published in a [`ComponentStore`].
pub trait Published: Clone + PartialEq + Send + Sync + 'static {
    const KIND: ComponentKind;

    #[doc(hidden)]
    fn into_handle(receiver: watch::Receiver<Option<Arc<Self>>>) -> ComponentHandle;

    #[doc(hidden)]
    fn receiver(handle: &ComponentHandle) -> Option<watch::Receiver<Option<Arc<Self>>>>;
}

macro_rules! published_kinds {
    ($($kind:ident => $ty:ty),* $(,)?) => {
        /// Type-erased receiver stored in the registry.
        #[doc(hidden)]
        pub enum ComponentHandle {
            $($kind(watch::Receiver<Option<Arc<$ty>>>),)*
        }

        $(
            impl Published for $ty {
                const KIND: ComponentKind = ComponentKind::$kind;

                fn into_handle(receiver: watch::Receiver<Option<Arc<Self>>>) -> ComponentHandle {
                    ComponentHandle::$kind(receiver)
                }

                fn receiver(handle: &ComponentHandle) -> Option<watch::Receiver<Option<Arc<Self>>>> {
                    match handle {
                        ComponentHandle::$kind(receiver) => Some(receiver.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

published_kinds! {
    Camera => CameraState,
    Alarms => Alarms,
    AntiFlicker => AntiFlickerState,
    Gps => GpsState,
}

// ── Store ────────────────────────────────────────────────────────────

/// Per-device registry of published components.
pub struct ComponentStore {
    handles: DashMap<ComponentKey, ComponentHandle>,
    changes: broadcast::Sender<ComponentChange>,
}

impl ComponentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            handles: DashMap::new(),
            changes,
        }
    }

    /// Subscribe to publish/unpublish notifications.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ComponentChange> {
        self.changes.subscribe()
    }

    /// Watch component `T` at `instance`. `None` if no controller owns
    /// that key; the stream may still yield `None` while unpublished.
    pub fn watch<T: Published>(&self, instance: u8) -> Option<ComponentStream<T>> {
        let key = ComponentKey {
            kind: T::KIND,
            instance,
        };
        let handle = self.handles.get(&key)?;
        T::receiver(&handle).map(ComponentStream::new)
    }

    /// Current snapshot of component `T` at `instance`, if published.
    pub fn get<T: Published>(&self, instance: u8) -> Option<Arc<T>> {
        self.watch::<T>(instance)?.current().cloned()
    }

    pub fn is_published(&self, key: ComponentKey) -> bool {
        self.handles.get(&key).is_some_and(|handle| match &*handle {
            ComponentHandle::Camera(rx) => rx.borrow().is_some(),
            ComponentHandle::Alarms(rx) => rx.borrow().is_some(),
            ComponentHandle::AntiFlicker(rx) => rx.borrow().is_some(),
            ComponentHandle::Gps(rx) => rx.borrow().is_some(),
        })
    }

    /// Keys of every currently published component, sorted.
    pub fn published(&self) -> Vec<ComponentKey> {
        // Collect first: `is_published` locks the same shards.
        let mut keys: Vec<ComponentKey> = self.handles.iter().map(|entry| *entry.key()).collect();
        keys.retain(|key| self.is_published(*key));
        keys.sort();
        keys
    }

    fn notify(&self, change: ComponentChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentStore")
            .field("published", &self.published())
            .finish_non_exhaustive()
    }
}

// ── Owner side ───────────────────────────────────────────────────────

/// The controller-owned side of one published component.
///
/// Dropping it unpublishes the component and removes its key.
pub struct Component<T: Published> {
    key: ComponentKey,
    store: Arc<ComponentStore>,
    sender: watch::Sender<Option<Arc<T>>>,
}

impl<T: Published> Component<T> {
    pub fn new(store: Arc<ComponentStore>, instance: u8) -> Self {
        let key = ComponentKey {
            kind: T::KIND,
            instance,
        };
        let (sender, receiver) = watch::channel(None);
        store.handles.insert(key, T::into_handle(receiver));
        Self { key, store, sender }
    }

    pub fn key(&self) -> ComponentKey {
        self.key
    }

    pub fn is_published(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Publishes `snapshot`, or refreshes it if already published.
    pub fn publish(&self, snapshot: T) {
        let was_published = self.is_published();
        self.sender.send_if_modified(|slot| {
            if slot.as_deref() == Some(&snapshot) {
                return false;
            }
            *slot = Some(Arc::new(snapshot));
            true
        });
        if !was_published {
            debug!(component = %self.key.kind, instance = self.key.instance, "published");
            self.store.notify(ComponentChange::Published(self.key));
        }
    }

    pub fn unpublish(&self) {
        let was_published = self.sender.send_if_modified(|slot| slot.take().is_some());
        if was_published {
            debug!(component = %self.key.kind, instance = self.key.instance, "unpublished");
            self.store.notify(ComponentChange::Unpublished(self.key));
        }
    }

    /// Pushes a new snapshot to observers if published and changed.
    /// Returns `true` if observers were notified.
    pub fn notify_updated(&self, snapshot: T) -> bool {
        self.sender.send_if_modified(|slot| {
            let Some(current) = slot.as_deref() else {
                return false;
            };
            if *current == snapshot {
                return false;
            }
            *slot = Some(Arc::new(snapshot));
            true
        })
    }
}

impl<T: Published> Drop for Component<T> {
    fn drop(&mut self) {
        self.unpublish();
        self.store.handles.remove(&self.key);
    }
}

// ── Observer side ────────────────────────────────────────────────────

/// A subscription to one published component.
pub struct ComponentStream<T: Published> {
    current: Option<Arc<T>>,
    receiver: watch::Receiver<Option<Arc<T>>>,
}

impl<T: Published> ComponentStream<T> {
    fn new(receiver: watch::Receiver<Option<Arc<T>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> Option<&Arc<T>> {
        self.current.as_ref()
    }

    /// Latest snapshot, which may be newer than `current()`.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next change. The outer `None` means the owning
    /// controller is gone; the inner `None` means the component was
    /// unpublished.
    pub async fn changed(&mut self) -> Option<Option<Arc<T>>> {
        self.receiver.changed().await.ok()?;
        let snapshot = self.receiver.borrow_and_update().clone();
        self.current.clone_from(&snapshot);
        Some(snapshot)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ComponentWatchStream<T> {
        ComponentWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding every snapshot, starting with the current one.
pub struct ComponentWatchStream<T: Published> {
    inner: WatchStream<Option<Arc<T>>>,
}

impl<T: Published> Stream for ComponentWatchStream<T> {
    type Item = Option<Arc<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
