//! In-memory resource store with per-key fetch lifecycle tracking
//!
//! Provides a `ResourceStore` that keeps one entry per logical key, tracks
//! the fetch status of each entry (idle/loading/success/error), derives
//! staleness from the last successful fetch time, and guards completions
//! with fetch tickets so a superseded in-flight fetch can never overwrite
//! a fresher result.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::data::FetchError;

/// Fetch lifecycle status of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Entry exists but no fetch has been started
    Idle,
    /// A fetch is in flight
    Loading,
    /// The last fetch completed successfully
    Success,
    /// The last fetch failed (a previously fetched value may still be present)
    Error,
}

/// Point-in-time view of a cache entry, handed to consumers and subscribers
///
/// Snapshots are detached from the store: reading one never blocks, and a
/// snapshot does not change when the underlying entry does.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot<T> {
    /// The key this snapshot was taken for
    #[allow(dead_code)]
    pub key: String,
    /// Current fetch status
    pub status: FetchStatus,
    /// Last successfully fetched value, retained across later errors
    pub value: Option<T>,
    /// Last failure, cleared on the next successful fetch
    pub error: Option<FetchError>,
    /// When the value was last successfully fetched
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Proof that a particular fetch was started for a key
///
/// Completions must present the ticket they were started with; a ticket
/// whose generation no longer matches the entry (because a newer fetch
/// started, or the entry was cleared) is silently discarded. This makes
/// result application last-started-wins rather than last-completed-wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: String,
    generation: u64,
}

impl FetchTicket {
    /// The key this ticket was issued for
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Handle returned by `subscribe`, used to unregister the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&EntrySnapshot<T>) + Send + Sync>;

/// One cached entry; exactly one exists per key at any time
struct Entry<T> {
    status: FetchStatus,
    value: Option<T>,
    error: Option<FetchError>,
    fetched_at: Option<DateTime<Utc>>,
    /// Generation of the most recently started fetch for this entry
    generation: u64,
}

impl<T> Entry<T> {
    fn idle() -> Self {
        Self {
            status: FetchStatus::Idle,
            value: None,
            error: None,
            fetched_at: None,
            generation: 0,
        }
    }
}

struct Subscriber<T> {
    id: u64,
    key: String,
    callback: Callback<T>,
}

struct StoreInner<T> {
    entries: HashMap<String, Entry<T>>,
    subscribers: Vec<Subscriber<T>>,
    /// Store-wide fetch generation counter; never reused, so a ticket from
    /// before an eviction can never match a recreated entry
    next_generation: u64,
    next_subscriber: u64,
}

/// In-memory map of asynchronous resource entries
///
/// Entries are created lazily on first access and evicted only by explicit
/// `clear`. The store performs no I/O itself; fetch results are applied via
/// `complete_success` / `complete_error` by whoever ran the fetch.
///
/// Timestamps are passed in by callers rather than read internally, so
/// staleness behaves deterministically under a simulated clock in tests.
pub struct ResourceStore<T> {
    inner: Mutex<StoreInner<T>>,
}

impl<T: Clone> Default for ResourceStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ResourceStore<T> {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                subscribers: Vec::new(),
                next_generation: 1,
                next_subscriber: 1,
            }),
        }
    }

    /// A poisoned lock only means another thread panicked mid-section;
    /// the entry map itself remains usable, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, StoreInner<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the entry snapshot for `key`, creating an idle entry if none
    /// exists. Never blocks on I/O and never starts a fetch.
    pub fn get_or_create(&self, key: &str) -> EntrySnapshot<T> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .entry(key.to_string())
            .or_insert_with(Entry::idle);
        snapshot_of(key, entry)
    }

    /// Returns the entry snapshot for `key` without creating one
    #[allow(dead_code)]
    pub fn snapshot(&self, key: &str) -> Option<EntrySnapshot<T>> {
        let inner = self.lock();
        inner.entries.get(key).map(|entry| snapshot_of(key, entry))
    }

    /// Transitions `key` to `Loading` and issues a fetch ticket
    ///
    /// Returns `None` if a fetch is already in flight for the key, in which
    /// case the caller must not start a duplicate request.
    pub fn begin_fetch(&self, key: &str) -> Option<FetchTicket> {
        let (ticket, snapshot, callbacks) = {
            let mut inner = self.lock();
            let already_loading = inner
                .entries
                .get(key)
                .map(|entry| entry.status == FetchStatus::Loading)
                .unwrap_or(false);
            if already_loading {
                return None;
            }
            let (ticket, snapshot) = start_fetch(&mut inner, key);
            let callbacks = subscribers_for(&inner, key);
            (ticket, snapshot, callbacks)
        };
        for callback in callbacks {
            callback(&snapshot);
        }
        Some(ticket)
    }

    /// Unconditionally starts a new fetch for `key`, superseding any fetch
    /// already in flight
    ///
    /// The superseded fetch's ticket stops matching the entry, so its
    /// eventual completion is discarded.
    pub fn begin_fetch_superseding(&self, key: &str) -> FetchTicket {
        let (ticket, snapshot, callbacks) = {
            let mut inner = self.lock();
            let (ticket, snapshot) = start_fetch(&mut inner, key);
            let callbacks = subscribers_for(&inner, key);
            (ticket, snapshot, callbacks)
        };
        for callback in callbacks {
            callback(&snapshot);
        }
        ticket
    }

    /// Records a successful fetch result
    ///
    /// Applies only when `ticket` still matches the entry's current fetch
    /// generation: sets `Success`, stores the value, records `now` as the
    /// fetch time, and clears any previous error.
    ///
    /// # Returns
    /// `true` if the result was applied, `false` if the ticket was
    /// superseded or its entry cleared.
    pub fn complete_success(&self, ticket: &FetchTicket, value: T, now: DateTime<Utc>) -> bool {
        let (snapshot, callbacks) = {
            let mut inner = self.lock();
            let Some(entry) = inner.entries.get_mut(&ticket.key) else {
                return false;
            };
            if entry.generation != ticket.generation {
                return false;
            }
            entry.status = FetchStatus::Success;
            entry.value = Some(value);
            entry.error = None;
            entry.fetched_at = Some(now);
            let snapshot = snapshot_of(&ticket.key, entry);
            let callbacks = subscribers_for(&inner, &ticket.key);
            (snapshot, callbacks)
        };
        for callback in callbacks {
            callback(&snapshot);
        }
        true
    }

    /// Records a failed fetch
    ///
    /// Applies only when `ticket` is still current: sets `Error` and stores
    /// the failure. A previously fetched value is left untouched so
    /// consumers can keep showing it (stale-while-error).
    pub fn complete_error(&self, ticket: &FetchTicket, error: FetchError) -> bool {
        let (snapshot, callbacks) = {
            let mut inner = self.lock();
            let Some(entry) = inner.entries.get_mut(&ticket.key) else {
                return false;
            };
            if entry.generation != ticket.generation {
                return false;
            }
            entry.status = FetchStatus::Error;
            entry.error = Some(error);
            let snapshot = snapshot_of(&ticket.key, entry);
            let callbacks = subscribers_for(&inner, &ticket.key);
            (snapshot, callbacks)
        };
        for callback in callbacks {
            callback(&snapshot);
        }
        true
    }

    /// Whether `ticket` would still be accepted by a completion call
    ///
    /// Lets a long retry loop bail out early once it has been superseded.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        let inner = self.lock();
        inner
            .entries
            .get(&ticket.key)
            .map(|entry| entry.generation == ticket.generation)
            .unwrap_or(false)
    }

    /// Whether the entry for `key` is stale at `now`
    ///
    /// An entry is stale when it has never fetched successfully, or when
    /// more than `stale_time` has passed since its last successful fetch.
    /// A missing entry is stale.
    pub fn is_stale(&self, key: &str, stale_time: Duration, now: DateTime<Utc>) -> bool {
        let inner = self.lock();
        let fetched_at = inner.entries.get(key).and_then(|entry| entry.fetched_at);
        match fetched_at {
            Some(fetched_at) => match (now - fetched_at).to_std() {
                Ok(age) => age > stale_time,
                // fetched_at in the future relative to `now`: treat as fresh
                Err(_) => false,
            },
            None => true,
        }
    }

    /// Evicts the entry for `key`
    ///
    /// Any outstanding fetch tickets for the entry stop matching, so an
    /// in-flight fetch started before the clear can never apply its result.
    /// Subscribers are notified with an idle snapshot.
    #[allow(dead_code)]
    pub fn clear(&self, key: &str) {
        let notification = {
            let mut inner = self.lock();
            if inner.entries.remove(key).is_none() {
                return;
            }
            let snapshot = snapshot_of(key, &Entry::idle());
            let callbacks = subscribers_for(&inner, key);
            (snapshot, callbacks)
        };
        let (snapshot, callbacks) = notification;
        for callback in callbacks {
            callback(&snapshot);
        }
    }

    /// Evicts every entry without notifying subscribers individually
    #[allow(dead_code)]
    pub fn clear_all(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
    }

    /// Registers `callback` to run after every mutation of `key`'s entry
    ///
    /// The callback receives the post-mutation snapshot. It is invoked with
    /// the store lock released, but must not call back into the store.
    #[allow(dead_code)]
    pub fn subscribe(
        &self,
        key: &str,
        callback: impl Fn(&EntrySnapshot<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut inner = self.lock();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push(Subscriber {
            id,
            key: key.to_string(),
            callback: Arc::new(callback),
        });
        SubscriptionId(id)
    }

    /// Unregisters a subscription; unknown ids are ignored
    #[allow(dead_code)]
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.lock();
        inner.subscribers.retain(|sub| sub.id != id.0);
    }
}

/// Marks the entry as loading under a fresh generation and issues its ticket
fn start_fetch<T: Clone>(inner: &mut StoreInner<T>, key: &str) -> (FetchTicket, EntrySnapshot<T>) {
    let generation = inner.next_generation;
    inner.next_generation += 1;
    let entry = inner
        .entries
        .entry(key.to_string())
        .or_insert_with(Entry::idle);
    entry.status = FetchStatus::Loading;
    entry.generation = generation;
    let ticket = FetchTicket {
        key: key.to_string(),
        generation,
    };
    let snapshot = snapshot_of(key, entry);
    (ticket, snapshot)
}

fn snapshot_of<T: Clone>(key: &str, entry: &Entry<T>) -> EntrySnapshot<T> {
    EntrySnapshot {
        key: key.to_string(),
        status: entry.status,
        value: entry.value.clone(),
        error: entry.error.clone(),
        fetched_at: entry.fetched_at,
    }
}

fn subscribers_for<T>(inner: &StoreInner<T>, key: &str) -> Vec<Callback<T>> {
    inner
        .subscribers
        .iter()
        .filter(|sub| sub.key == key)
        .map(|sub| Arc::clone(&sub.callback))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_get_or_create_returns_idle_entry() {
        let store: ResourceStore<String> = ResourceStore::new();

        let snapshot = store.get_or_create("fact");

        assert_eq!(snapshot.status, FetchStatus::Idle);
        assert!(snapshot.value.is_none());
        assert!(snapshot.error.is_none());
        assert!(snapshot.fetched_at.is_none());
    }

    #[test]
    fn test_get_or_create_is_stable_without_mutation() {
        let store: ResourceStore<String> = ResourceStore::new();

        let first = store.get_or_create("fact");
        let second = store.get_or_create("fact");

        assert_eq!(first, second, "Repeated access must yield the same entry");
    }

    #[test]
    fn test_snapshot_returns_none_for_missing_key() {
        let store: ResourceStore<String> = ResourceStore::new();

        assert!(store.snapshot("missing").is_none());
    }

    #[test]
    fn test_begin_fetch_transitions_to_loading() {
        let store: ResourceStore<String> = ResourceStore::new();

        let ticket = store.begin_fetch("fact");

        assert!(ticket.is_some());
        let snapshot = store.get_or_create("fact");
        assert_eq!(snapshot.status, FetchStatus::Loading);
    }

    #[test]
    fn test_begin_fetch_refuses_duplicate_while_loading() {
        let store: ResourceStore<String> = ResourceStore::new();

        let first = store.begin_fetch("fact");
        let second = store.begin_fetch("fact");

        assert!(first.is_some());
        assert!(second.is_none(), "Second fetch must not start while loading");
    }

    #[test]
    fn test_complete_success_sets_value_and_clears_error() {
        let store: ResourceStore<String> = ResourceStore::new();

        let ticket = store.begin_fetch("fact").unwrap();
        store.complete_error(&ticket, FetchError::Network("offline".into()));

        let ticket = store.begin_fetch("fact").unwrap();
        let applied = store.complete_success(&ticket, "cats sleep a lot".into(), now());

        assert!(applied);
        let snapshot = store.get_or_create("fact");
        assert_eq!(snapshot.status, FetchStatus::Success);
        assert_eq!(snapshot.value.as_deref(), Some("cats sleep a lot"));
        assert!(snapshot.error.is_none(), "Success must clear the error");
        assert_eq!(snapshot.fetched_at, Some(now()));
    }

    #[test]
    fn test_failed_fetch_keeps_last_successful_value() {
        let store: ResourceStore<String> = ResourceStore::new();

        let ticket = store.begin_fetch("fact").unwrap();
        store.complete_success(&ticket, "first".into(), now());

        let ticket = store.begin_fetch("fact").unwrap();
        store.complete_error(&ticket, FetchError::Network("timeout".into()));

        let snapshot = store.get_or_create("fact");
        assert_eq!(snapshot.status, FetchStatus::Error);
        assert_eq!(
            snapshot.value.as_deref(),
            Some("first"),
            "Error must not erase the previous value"
        );
        assert!(snapshot.error.is_some());
    }

    #[test]
    fn test_is_stale_for_missing_and_unfetched_entries() {
        let store: ResourceStore<String> = ResourceStore::new();

        assert!(store.is_stale("missing", Duration::from_secs(5), now()));

        store.get_or_create("fact");
        assert!(store.is_stale("fact", Duration::from_secs(5), now()));
    }

    #[test]
    fn test_is_stale_respects_stale_time() {
        let store: ResourceStore<String> = ResourceStore::new();
        let fetched = now();

        let ticket = store.begin_fetch("fact").unwrap();
        store.complete_success(&ticket, "value".into(), fetched);

        let stale_time = Duration::from_millis(5000);
        assert!(!store.is_stale("fact", stale_time, fetched));
        assert!(!store.is_stale(
            "fact",
            stale_time,
            fetched + chrono::Duration::milliseconds(5000)
        ));
        assert!(store.is_stale(
            "fact",
            stale_time,
            fetched + chrono::Duration::milliseconds(5001)
        ));
    }

    #[test]
    fn test_superseded_completion_is_discarded() {
        let store: ResourceStore<String> = ResourceStore::new();

        let ticket_a = store.begin_fetch("fact").unwrap();
        let ticket_b = store.begin_fetch_superseding("fact");

        let applied_b = store.complete_success(&ticket_b, "B".into(), now());
        // A resolves after B, out of start order; it must be discarded.
        let applied_a = store.complete_success(&ticket_a, "A".into(), now());

        assert!(applied_b);
        assert!(!applied_a, "Superseded fetch must not apply its result");
        let snapshot = store.get_or_create("fact");
        assert_eq!(snapshot.value.as_deref(), Some("B"));
    }

    #[test]
    fn test_superseded_error_is_discarded() {
        let store: ResourceStore<String> = ResourceStore::new();

        let ticket_a = store.begin_fetch("fact").unwrap();
        let ticket_b = store.begin_fetch_superseding("fact");

        store.complete_success(&ticket_b, "fresh".into(), now());
        let applied = store.complete_error(&ticket_a, FetchError::Network("late".into()));

        assert!(!applied);
        let snapshot = store.get_or_create("fact");
        assert_eq!(snapshot.status, FetchStatus::Success);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_clear_invalidates_outstanding_tickets() {
        let store: ResourceStore<String> = ResourceStore::new();

        let ticket = store.begin_fetch("fact").unwrap();
        store.clear("fact");

        assert!(!store.is_current(&ticket));
        assert!(!store.complete_success(&ticket, "late".into(), now()));
        // A discarded completion must not recreate the entry either
        assert!(store.snapshot("fact").is_none());
    }

    #[test]
    fn test_ticket_from_before_clear_never_matches_recreated_entry() {
        let store: ResourceStore<String> = ResourceStore::new();

        let old_ticket = store.begin_fetch("fact").unwrap();
        store.clear("fact");

        let new_ticket = store.begin_fetch("fact").unwrap();
        assert!(store.is_current(&new_ticket));
        assert!(!store.is_current(&old_ticket));
    }

    #[test]
    fn test_subscriber_receives_post_mutation_snapshots() {
        let store: ResourceStore<String> = ResourceStore::new();
        let seen: Arc<Mutex<Vec<FetchStatus>>> = Arc::new(Mutex::new(Vec::new()));

        let seen_by_callback = Arc::clone(&seen);
        store.subscribe("fact", move |snapshot| {
            seen_by_callback.lock().unwrap().push(snapshot.status);
        });

        let ticket = store.begin_fetch("fact").unwrap();
        store.complete_success(&ticket, "value".into(), now());

        let statuses = seen.lock().unwrap().clone();
        assert_eq!(statuses, vec![FetchStatus::Loading, FetchStatus::Success]);
    }

    #[test]
    fn test_subscriber_for_other_key_is_not_notified() {
        let store: ResourceStore<String> = ResourceStore::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_by_callback = Arc::clone(&calls);
        store.subscribe("other", move |_| {
            calls_by_callback.fetch_add(1, Ordering::SeqCst);
        });

        let ticket = store.begin_fetch("fact").unwrap();
        store.complete_success(&ticket, "value".into(), now());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store: ResourceStore<String> = ResourceStore::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_by_callback = Arc::clone(&calls);
        let id = store.subscribe("fact", move |_| {
            calls_by_callback.fetch_add(1, Ordering::SeqCst);
        });
        store.unsubscribe(id);

        store.begin_fetch("fact");

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clear_notifies_with_idle_snapshot() {
        let store: ResourceStore<String> = ResourceStore::new();
        let seen: Arc<Mutex<Vec<EntrySnapshot<String>>>> = Arc::new(Mutex::new(Vec::new()));

        let ticket = store.begin_fetch("fact").unwrap();
        store.complete_success(&ticket, "value".into(), now());

        let seen_by_callback = Arc::clone(&seen);
        store.subscribe("fact", move |snapshot| {
            seen_by_callback.lock().unwrap().push(snapshot.clone());
        });
        store.clear("fact");

        let snapshots = seen.lock().unwrap().clone();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].status, FetchStatus::Idle);
        assert!(snapshots[0].value.is_none());
    }
}
