//! Mutation tracker: the server-side state tree and its explicit cursor API.
//!
//! Rust has no transparent proxies, so the "every read/write is observable"
//! contract is realized the way the design notes prescribe for
//! metaprogramming-poor environments: an explicit cursor that carries its
//! path and offers `child`/`value`/`set`. Every write funnels through
//! [`StateTracker::write_at`] so exactly one patch is emitted per observed
//! mutation, matching the invariant that the tracker never exposes an
//! intermediate state to an observer.

use crate::ConnId;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use yuzu_core::tree::{array_at_mut, delete_at, missing_segment_error, read_at, write_at};
use yuzu_core::{Patch, Path, Result};
use serde_json::Value;

/// The server's authoritative state tree plus the patch stream produced by
/// observed writes.
///
/// Cloning shares the same underlying tree and patch channel; all clones
/// serialize onto the same `tokio::sync::Mutex` (§5: "serialize all
/// operations on a given tracker instance onto one execution context").
#[derive(Clone)]
pub struct StateTracker {
    state: Arc<Mutex<Value>>,
    patch_tx: mpsc::UnboundedSender<Patch>,
}

impl StateTracker {
    /// Construct a tracker seeded with `initial`, returning it paired with
    /// the receiving end of its patch stream (fed to the patch batcher).
    pub fn new(initial: Value) -> (Self, mpsc::UnboundedReceiver<Patch>) {
        let (patch_tx, patch_rx) = mpsc::unbounded_channel();
        (
            StateTracker {
                state: Arc::new(Mutex::new(initial)),
                patch_tx,
            },
            patch_rx,
        )
    }

    /// The cursor for the root of the tree.
    pub fn root(&self) -> StateCursor {
        StateCursor {
            tracker: self.clone(),
            path: Path::root(),
        }
    }

    /// The whole tree as of this call, for servicing a `complete` request.
    pub async fn snapshot(&self) -> Value {
        self.state.lock().await.clone()
    }

    /// Assign `value` at `path`, emitting exactly one patch.
    ///
    /// The empty path replaces the entire tree.
    pub async fn set(&self, path: &Path, value: Value) -> Result<()> {
        let mut state = self.state.lock().await;
        write_at(&mut state, path, value.clone())?;
        drop(state);
        self.emit(Patch::new(path.clone(), value));
        Ok(())
    }

    /// Remove a keyed entry (or null out an array element), emitting a
    /// patch whose value is the absent sentinel (`null`).
    ///
    /// This is the assign-absent API the design notes call out as the
    /// supported replacement for a host `delete` primitive (§9): unlike an
    /// untracked deletion, it always emits a patch.
    pub async fn delete(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().await;
        delete_at(&mut state, path)?;
        drop(state);
        self.emit(Patch::new(path.clone(), Value::Null));
        Ok(())
    }

    /// Append `values` to the array at `path`, emitting one patch per new
    /// element followed by one patch for the new length (the "chatty"
    /// sequence documented for array mutators, §4.1).
    pub async fn push(&self, path: &Path, values: Vec<Value>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        let array = array_at_mut(&mut state, path)?;
        let start_index = array.len();
        for value in &values {
            array.push(value.clone());
        }
        let new_length = array.len();
        drop(state);

        for (offset, value) in values.into_iter().enumerate() {
            self.emit(Patch::new(path.child(Path::index_segment(start_index + offset)), value));
        }
        self.emit(Patch::new(path.child("length"), Value::from(new_length)));
        Ok(())
    }

    /// Read the value at `path`, failing if any segment along the way is
    /// missing (`readPathExisting`).
    pub async fn read_existing(&self, path: &Path) -> Result<Value> {
        let state = self.state.lock().await;
        read_at(&state, path)
            .cloned()
            .ok_or_else(|| missing_segment_error(path))
    }

    /// Read the value at `path`, returning `Value::Null` if any segment is
    /// missing (`readPathOptional`).
    pub async fn read_optional(&self, path: &Path) -> Value {
        let state = self.state.lock().await;
        read_at(&state, path).cloned().unwrap_or(Value::Null)
    }

    fn emit(&self, patch: Patch) {
        // Unbounded send never blocks: the tracker never awaits inside a
        // write, matching the no-await-in-a-write-trap requirement.
        let _ = self.patch_tx.send(patch);
    }
}

/// An explicit cursor carrying the path walked so far from the root.
///
/// `child`, `value` and `set` together stand in for the proxy-based
/// mutation capture described in §4.1 for environments without
/// metaprogramming (§9's design note).
#[derive(Clone)]
pub struct StateCursor {
    tracker: StateTracker,
    path: Path,
}

impl StateCursor {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Descend to a nested container, carrying the extended path.
    pub fn child(&self, key: impl Into<String>) -> StateCursor {
        StateCursor {
            tracker: self.tracker.clone(),
            path: self.path.child(key),
        }
    }

    /// Read the current value at this cursor's path.
    pub async fn value(&self) -> Value {
        self.tracker.read_optional(&self.path).await
    }

    /// Assign a value at this cursor's path, emitting one patch.
    pub async fn set(&self, value: Value) -> Result<()> {
        self.tracker.set(&self.path, value).await
    }

    /// Assign-absent at this cursor's path.
    pub async fn delete(&self) -> Result<()> {
        self.tracker.delete(&self.path).await
    }

    /// Append to the array at this cursor's path.
    pub async fn push(&self, value: Value) -> Result<()> {
        self.tracker.push(&self.path, vec![value]).await
    }

    /// Append several values to the array at this cursor's path in one
    /// call, as a host-language `push(a, b, ...)` would.
    pub async fn push_many(&self, values: Vec<Value>) -> Result<()> {
        self.tracker.push(&self.path, values).await
    }
}

/// A stable identifier assigned to each server-side endpoint, used only to
/// direct targeted `complete` replies (§3: "an optional stable client
/// identifier").
pub type TrackerConnId = ConnId;
