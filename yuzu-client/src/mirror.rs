//! Patch applier and the subscribable projection (§4.4).
//!
//! The client holds one local copy of the state tree, reached two ways:
//!
//! - [`Mirror::cursor`] — a plain read-only view.
//! - [`Mirror::subscribable`] — a [`SubscribableCursor`] whose every
//!   readable container additionally carries a `subscribe` operation,
//!   standing in for the proxy-based "subscribable projection" described
//!   for environments without metaprogramming (§9's design note; see
//!   `yuzu-server::tracker` for the mutation-side half of the same idiom).
//!
//! Both views read through the same underlying tree; the projection adds
//! `subscribe`, nothing else — writing through either view is not
//! supported (§4.4 invariant: "the projection is read-only from the
//! client's perspective").

use crate::subscription::{SubscriptionHandle, SubscriptionRegistry};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use yuzu_core::tree::{missing_segment_error, read_at, write_at};
use yuzu_core::{Patch, Path, Result};

/// The client's local copy of the server's state tree.
#[derive(Clone)]
pub struct Mirror {
    state: Arc<Mutex<Value>>,
    registry: Arc<SubscriptionRegistry>,
}

impl Mirror {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Mirror {
            state: Arc::new(Mutex::new(Value::Null)),
            registry,
        }
    }

    /// Replace the entire tree (`complete` message, or a root-path patch).
    pub async fn replace(&self, value: Value) {
        *self.state.lock().await = value;
    }

    /// Apply one patch (`{path, value}`) to the local mirror.
    pub async fn apply(&self, patch: &Patch) -> Result<()> {
        let mut state = self.state.lock().await;
        write_at(&mut state, &patch.path, patch.value.clone())
    }

    /// `readPathExisting`: fails if any segment along `path` is missing.
    pub async fn read_existing(&self, path: &Path) -> Result<Value> {
        let state = self.state.lock().await;
        read_at(&state, path)
            .cloned()
            .ok_or_else(|| missing_segment_error(path))
    }

    /// `readPathOptional`: returns the absent sentinel (`Value::Null`) if
    /// any segment along `path` is missing.
    pub async fn read_optional(&self, path: &Path) -> Value {
        let state = self.state.lock().await;
        read_at(&state, path).cloned().unwrap_or(Value::Null)
    }

    /// A read-only cursor at the root of the plain view.
    pub fn cursor(&self) -> PlainCursor {
        PlainCursor {
            mirror: self.clone(),
            path: Path::root(),
        }
    }

    /// A subscribable cursor at the root of the tree.
    pub fn subscribable(&self) -> SubscribableCursor {
        SubscribableCursor {
            mirror: self.clone(),
            path: Path::root(),
        }
    }
}

/// A structurally-typed cursor over the plain (non-subscribable) view.
///
/// Reading the same path twice yields two cursors that behave
/// identically but need not share identity, matching the corresponding
/// invariant for the subscribable projection.
#[derive(Clone)]
pub struct PlainCursor {
    mirror: Mirror,
    path: Path,
}

impl PlainCursor {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn child(&self, key: impl Into<String>) -> PlainCursor {
        PlainCursor {
            mirror: self.mirror.clone(),
            path: self.path.child(key),
        }
    }

    pub async fn value(&self) -> Value {
        self.mirror.read_optional(&self.path).await
    }
}

/// A cursor over the subscribable projection: every readable container
/// carries `subscribe`; primitive leaves do not (§4.4 invariant — callers
/// observe a leaf by subscribing on its parent container).
#[derive(Clone)]
pub struct SubscribableCursor {
    mirror: Mirror,
    path: Path,
}

impl SubscribableCursor {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn child(&self, key: impl Into<String>) -> SubscribableCursor {
        SubscribableCursor {
            mirror: self.mirror.clone(),
            path: self.path.child(key),
        }
    }

    pub async fn value(&self) -> Value {
        self.mirror.read_optional(&self.path).await
    }

    /// Register `listener` at this cursor's path. Returns a handle whose
    /// `unsubscribe()` removes exactly this registration.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionHandle
    where
        F: Fn(Value, Path) + Send + Sync + 'static,
    {
        self.mirror.registry.add(self.path.clone(), listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionRegistry;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn new_mirror() -> Mirror {
        Mirror::new(Arc::new(SubscriptionRegistry::new()))
    }

    #[tokio::test]
    async fn replace_sets_the_whole_tree() {
        let mirror = new_mirror();
        mirror.replace(json!({"count": 42})).await;
        assert_eq!(mirror.cursor().child("count").value().await, json!(42));
    }

    #[tokio::test]
    async fn apply_writes_at_the_patch_path() {
        let mirror = new_mirror();
        mirror.replace(json!({"user": {"profile": {"name": "John"}}})).await;
        mirror
            .apply(&Patch::new(Path::new(["user", "profile", "name"]), json!("Jane")))
            .await
            .unwrap();
        assert_eq!(
            mirror.cursor().child("user").child("profile").child("name").value().await,
            json!("Jane")
        );
    }

    #[tokio::test]
    async fn root_path_patch_replaces_everything() {
        let mirror = new_mirror();
        mirror.replace(json!({"count": 5})).await;
        mirror
            .apply(&Patch::root(json!({"count": 42, "name": "test"})))
            .await
            .unwrap();
        assert_eq!(mirror.cursor().value().await, json!({"count": 42, "name": "test"}));
    }

    #[tokio::test]
    async fn reading_the_same_path_twice_yields_equal_independent_cursors() {
        let mirror = new_mirror();
        mirror.replace(json!({"a": 1})).await;
        let a = mirror.cursor().child("a");
        let b = mirror.cursor().child("a");
        assert_eq!(a.value().await, b.value().await);
    }

    #[tokio::test]
    async fn subscribing_on_a_subscribable_cursor_registers_at_its_path() {
        let mirror = new_mirror();
        mirror.replace(json!({"count": 0})).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let _handle = mirror
            .subscribable()
            .child("count")
            .subscribe(move |_value, _path| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });

        mirror
            .apply(&Patch::new(Path::new(["count"]), json!(1)))
            .await
            .unwrap();
        mirror.registry.notify_single(&mirror, &Path::new(["count"])).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
