//! Subscription registry and handle (§4.3, §3).
//!
//! An insertion-ordered collection of `(path, callback)` pairs, matched
//! against incoming patches by the prefix rule: a listener at path `L`
//! fires on a patch at path `P` iff `L` is a prefix of `P`, with the
//! empty path matching everything. `notify_batch` fires each matched
//! listener at most once per batch, reporting the listener's own path as
//! the "triggering path" — a documented quirk (§9), not a bug: a single
//! invocation can't faithfully attribute one of several triggers.

use crate::mirror::Mirror;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use yuzu_core::Path;

type Callback = Arc<dyn Fn(Value, Path) + Send + Sync>;

struct Record {
    id: u64,
    path: Path,
    callback: Callback,
}

/// Insertion-ordered `(path, listener)` storage, answering "which
/// listeners are triggered by path P?" (§2).
pub struct SubscriptionRegistry {
    records: Mutex<Vec<Record>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry {
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register `listener` at `path`. The returned handle's teardown
    /// removes exactly this record.
    pub fn add<F>(self: &Arc<Self>, path: Path, listener: F) -> SubscriptionHandle
    where
        F: Fn(Value, Path) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().push(Record {
            id,
            path,
            callback: Arc::new(listener),
        });
        let registry = self.clone();
        SubscriptionHandle::new(move || registry.remove(id))
    }

    fn remove(&self, id: u64) {
        self.records.lock().unwrap().retain(|r| r.id != id);
    }

    /// A single patch landed at `path`: invoke every listener whose path
    /// is a prefix of it, in insertion order.
    pub async fn notify_single(&self, mirror: &Mirror, path: &Path) {
        for (listener_path, callback) in self.matching(|r| r.path.is_prefix_of(path)) {
            if let Ok(value) = mirror.read_existing(&listener_path).await {
                invoke(&callback, value, path.clone());
            }
        }
    }

    /// A batch of patches landed: invoke each matched listener at most
    /// once, reporting its own path as the trigger (§4.3, §9).
    pub async fn notify_batch(&self, mirror: &Mirror, paths: &[Path]) {
        for (listener_path, callback) in
            self.matching(|r| paths.iter().any(|p| r.path.is_prefix_of(p)))
        {
            if let Ok(value) = mirror.read_existing(&listener_path).await {
                invoke(&callback, value, listener_path);
            }
        }
    }

    /// `complete` reload: invoke every listener with `[]` as the
    /// triggering path. Uses `readPathOptional` rather than the
    /// existing-only flavor so a freshly-replaced tree that happens not
    /// to contain a listener's path still notifies it (§8: "all
    /// registered listeners have been notified at least once").
    pub async fn notify_all(&self, mirror: &Mirror) {
        for (listener_path, callback) in self.matching(|_| true) {
            let value = mirror.read_optional(&listener_path).await;
            invoke(&callback, value, Path::root());
        }
    }

    fn matching(&self, predicate: impl Fn(&Record) -> bool) -> Vec<(Path, Callback)> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| predicate(r))
            .map(|r| (r.path.clone(), r.callback.clone()))
            .collect()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A listener is caught at the notification boundary if it panics: the
/// registry swallows it and continues with the remaining listeners
/// (§4.3, §7 — "not re-raised and not logged", a deliberate source
/// choice, see §9).
fn invoke(callback: &Callback, value: Value, triggering_path: Path) {
    let callback = callback.clone();
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
        callback(value, triggering_path)
    }));
}

enum Teardown {
    Handle(SubscriptionHandle),
    Fn(Box<dyn FnOnce() + Send>),
}

/// An opaque handle to a registration, with idempotent `unsubscribe()`
/// (§3). Handles compose: `add`-ing another handle transfers its
/// teardown under this one, so unsubscribing the outer handle tears down
/// the inner one too.
#[derive(Clone)]
pub struct SubscriptionHandle {
    closed: Arc<AtomicBool>,
    teardowns: Arc<Mutex<Vec<Teardown>>>,
}

impl SubscriptionHandle {
    pub(crate) fn new<F: FnOnce() + Send + 'static>(teardown: F) -> Self {
        SubscriptionHandle {
            closed: Arc::new(AtomicBool::new(false)),
            teardowns: Arc::new(Mutex::new(vec![Teardown::Fn(Box::new(teardown))])),
        }
    }

    /// An empty handle with no teardown of its own — useful as a
    /// composite root that only exists to aggregate `add`ed handles.
    pub fn empty() -> Self {
        SubscriptionHandle {
            closed: Arc::new(AtomicBool::new(false)),
            teardowns: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear down this registration (and anything `add`ed to it). Calling
    /// this more than once is a no-op after the first call.
    pub fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let teardowns = std::mem::take(&mut *self.teardowns.lock().unwrap());
        for teardown in teardowns {
            run(teardown);
        }
    }

    /// Transfer another handle's teardown under this one.
    pub fn add(&self, other: SubscriptionHandle) {
        self.push(Teardown::Handle(other));
    }

    /// Run `teardown` when this handle is unsubscribed.
    pub fn add_fn<F: FnOnce() + Send + 'static>(&self, teardown: F) {
        self.push(Teardown::Fn(Box::new(teardown)));
    }

    fn push(&self, teardown: Teardown) {
        if self.closed() {
            run(teardown);
        } else {
            self.teardowns.lock().unwrap().push(teardown);
        }
    }
}

fn run(teardown: Teardown) {
    match teardown {
        Teardown::Fn(f) => f(),
        Teardown::Handle(h) => h.unsubscribe(),
    }
}
