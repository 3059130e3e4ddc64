//! In-memory client store.
//!
//! Holds every collection as the raw JSON array last seen, plus the sync
//! bookkeeping for it. Mutations are synchronous and never cross an await;
//! the [`SyncEngine`](crate::sync::SyncEngine) does the network half.
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ──begin_load──▶ Loading ──finish_load──▶ Synced
//!                                                      │   ▲
//!                                               update │   │ mark_pushed / mark_local_fallback
//!                                                      ▼   │
//!                                                      Dirty
//!
//! any state ──apply_remote──▶ Synced   (broadcast wins, local delta discarded)
//! ```

use std::collections::HashMap;

use gramseva_types::{Collection, Record};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::constants::STORE_EVENT_CAPACITY;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Uninitialized,
    Loading,
    Synced,
    Dirty,
}

/// Where a change came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// A mutation made by this client.
    Local,
    /// A fetch or broadcast from the server (or the local cache at load).
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Changed { collection: Collection, origin: Origin },
}

#[derive(Debug)]
struct Slot {
    value: Value,
    state: SyncState,
    /// Canonical text of the last value pushed to or received from the server.
    last_pushed: Option<String>,
    /// Last push landed only in local storage.
    pending_local: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            value: Value::Array(Vec::new()),
            state: SyncState::Uninitialized,
            last_pushed: None,
            pending_local: false,
        }
    }
}

/// Canonical serialization used for deduplication. Object keys are sorted.
pub fn canonical(value: &Value) -> String {
    value.to_string()
}

pub struct ClientStore {
    slots: Mutex<HashMap<Collection, Slot>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(STORE_EVENT_CAPACITY);
        let slots = Collection::all().map(|c| (c, Slot::default())).collect();
        Self {
            slots: Mutex::new(slots),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn notify(&self, collection: Collection, origin: Origin) {
        // No subscribers is fine.
        let _ = self.events.send(StoreEvent::Changed { collection, origin });
    }

    fn with_slot<R>(&self, collection: Collection, f: impl FnOnce(&mut Slot) -> R) -> R {
        let mut slots = self.slots.lock();
        f(slots.entry(collection).or_default())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn state(&self, collection: Collection) -> SyncState {
        self.with_slot(collection, |s| s.state)
    }

    /// Current array, verbatim.
    pub fn raw(&self, collection: Collection) -> Value {
        self.with_slot(collection, |s| s.value.clone())
    }

    /// Typed copy of a collection. Entries that do not parse are skipped.
    pub fn snapshot<T: Record>(&self) -> Vec<T> {
        let value = self.raw(T::COLLECTION);
        parse_records(T::COLLECTION, value)
    }

    pub fn find<T: Record>(&self, id: &str) -> Option<T> {
        self.snapshot::<T>().into_iter().find(|r| r.id() == id)
    }

    /// Whether the last push for `collection` only reached local storage.
    pub fn pending_local(&self, collection: Collection) -> bool {
        self.with_slot(collection, |s| s.pending_local)
    }

    /// False when `canonical` equals what the server last saw from us.
    pub fn needs_push(&self, collection: Collection, canonical: &str) -> bool {
        self.with_slot(collection, |s| s.last_pushed.as_deref() != Some(canonical))
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    pub fn begin_load(&self, collection: Collection) {
        self.with_slot(collection, |s| {
            if s.state == SyncState::Uninitialized {
                s.state = SyncState::Loading;
            }
        });
    }

    /// Initial value from the local cache after a failed fetch.
    pub fn finish_local_load(&self, collection: Collection, value: Value) {
        self.with_slot(collection, |s| {
            s.value = value;
            s.state = SyncState::Synced;
        });
        self.notify(collection, Origin::Remote);
    }

    /// Cached value holding writes the server never received. Stays flagged
    /// for a re-push.
    pub fn restore_pending(&self, collection: Collection, value: Value) {
        self.with_slot(collection, |s| {
            s.value = value;
            s.state = SyncState::Synced;
            s.pending_local = true;
        });
        self.notify(collection, Origin::Remote);
    }

    /// Authoritative server value: overwrites unconditionally.
    pub fn apply_remote(&self, collection: Collection, value: Value) {
        let text = canonical(&value);
        self.with_slot(collection, |s| {
            if s.state == SyncState::Dirty {
                warn!(collection = %collection, "server value replaces unpushed local change");
            }
            s.value = value;
            s.state = SyncState::Synced;
            s.last_pushed = Some(text);
            s.pending_local = false;
        });
        trace!(collection = %collection, "applied server value");
        self.notify(collection, Origin::Remote);
    }

    /// Apply `f` to the typed collection. On `Err` nothing changes; on `Ok`
    /// the collection becomes `Dirty` and the new array is returned for
    /// pushing.
    pub fn update<T, R, E>(&self, f: impl FnOnce(&mut Vec<T>) -> Result<R, E>) -> Result<R, E>
    where
        T: Record,
        E: From<serde_json::Error>,
    {
        let collection = T::COLLECTION;
        let out = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(collection).or_default();
            let mut records = parse_records::<T>(collection, slot.value.clone());
            let out = f(&mut records)?;
            slot.value = serde_json::to_value(&records)?;
            slot.state = SyncState::Dirty;
            out
        };
        self.notify(collection, Origin::Local);
        Ok(out)
    }

    /// Server accepted `pushed`. Stays `Dirty` if the value moved on since.
    pub fn mark_pushed(&self, collection: Collection, pushed: &str) {
        self.with_slot(collection, |s| {
            s.last_pushed = Some(pushed.to_string());
            s.pending_local = false;
            if canonical(&s.value) == pushed {
                s.state = SyncState::Synced;
            }
        });
    }

    /// `pushed` went to local storage instead of the server.
    pub fn mark_local_fallback(&self, collection: Collection, pushed: &str) {
        self.with_slot(collection, |s| {
            s.pending_local = true;
            if canonical(&s.value) == pushed {
                s.state = SyncState::Synced;
            }
        });
    }
}

fn parse_records<T: Record>(collection: Collection, value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = %collection, error = %e, "skipping unreadable record");
                None
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gramseva_types::{AppNotification, NotificationKind};
    use serde_json::json;

    fn note(title: &str) -> AppNotification {
        AppNotification::new(NotificationKind::Info, title, "m")
    }

    #[test]
    fn test_initial_state() {
        let store = ClientStore::new();
        for c in Collection::all() {
            assert_eq!(store.state(c), SyncState::Uninitialized);
            assert_eq!(store.raw(c), json!([]));
        }
        store.begin_load(Collection::Bills);
        assert_eq!(store.state(Collection::Bills), SyncState::Loading);
    }

    #[test]
    fn test_update_marks_dirty_and_notifies() {
        let store = ClientStore::new();
        let mut events = store.subscribe();
        store.apply_remote(Collection::Notifications, json!([]));
        events.try_recv().unwrap();

        let id = store
            .update::<AppNotification, _, serde_json::Error>(|list| {
                let n = note("hello");
                let id = n.id.clone();
                list.push(n);
                Ok(id)
            })
            .unwrap();

        assert_eq!(store.state(Collection::Notifications), SyncState::Dirty);
        assert_eq!(store.snapshot::<AppNotification>()[0].id, id);
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::Changed {
                collection: Collection::Notifications,
                origin: Origin::Local
            }
        );
    }

    #[test]
    fn test_failed_update_changes_nothing() {
        #[derive(Debug)]
        struct Nope;
        impl From<serde_json::Error> for Nope {
            fn from(_: serde_json::Error) -> Self {
                Nope
            }
        }

        let store = ClientStore::new();
        store.apply_remote(Collection::Notifications, json!([]));
        let result = store.update::<AppNotification, (), Nope>(|list| {
            list.push(note("never"));
            Err(Nope)
        });
        assert!(result.is_err());
        assert_eq!(store.raw(Collection::Notifications), json!([]));
        assert_eq!(store.state(Collection::Notifications), SyncState::Synced);
    }

    #[test]
    fn test_broadcast_discards_local_delta() {
        let store = ClientStore::new();
        store
            .update::<AppNotification, _, serde_json::Error>(|list| {
                list.push(note("local"));
                Ok(())
            })
            .unwrap();
        assert_eq!(store.state(Collection::Notifications), SyncState::Dirty);

        let server = json!([{"id": "NOTIF-9", "title": "server", "message": "m"}]);
        store.apply_remote(Collection::Notifications, server.clone());
        assert_eq!(store.state(Collection::Notifications), SyncState::Synced);
        assert_eq!(store.raw(Collection::Notifications), server);
        assert!(!store.needs_push(Collection::Notifications, &canonical(&server)));
    }

    #[test]
    fn test_push_bookkeeping() {
        let store = ClientStore::new();
        store
            .update::<AppNotification, _, serde_json::Error>(|list| {
                list.push(note("a"));
                Ok(())
            })
            .unwrap();
        let first = canonical(&store.raw(Collection::Notifications));
        assert!(store.needs_push(Collection::Notifications, &first));

        store.mark_local_fallback(Collection::Notifications, &first);
        assert!(store.pending_local(Collection::Notifications));
        assert_eq!(store.state(Collection::Notifications), SyncState::Synced);
        assert!(store.needs_push(Collection::Notifications, &first));

        store.mark_pushed(Collection::Notifications, &first);
        assert!(!store.pending_local(Collection::Notifications));
        assert!(!store.needs_push(Collection::Notifications, &first));
    }

    #[test]
    fn test_push_of_stale_value_stays_dirty() {
        let store = ClientStore::new();
        store
            .update::<AppNotification, _, serde_json::Error>(|list| {
                list.push(note("a"));
                Ok(())
            })
            .unwrap();
        let pushed = canonical(&store.raw(Collection::Notifications));
        store
            .update::<AppNotification, _, serde_json::Error>(|list| {
                list.push(note("b"));
                Ok(())
            })
            .unwrap();
        store.mark_pushed(Collection::Notifications, &pushed);
        assert_eq!(store.state(Collection::Notifications), SyncState::Dirty);
    }

    #[test]
    fn test_snapshot_skips_unreadable_records() {
        let store = ClientStore::new();
        store.apply_remote(
            Collection::Notifications,
            json!([{"id": "NOTIF-1", "title": "ok", "message": "m"}, {"bogus": true}]),
        );
        let notes = store.snapshot::<AppNotification>();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, "NOTIF-1");
    }
}
