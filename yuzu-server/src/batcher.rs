//! Patch batcher: coalesces patches within a time window into one
//! `patch-batch` message.
//!
//! - `delay == 0` (default): every patch is forwarded synchronously as a
//!   `patch` message the moment it arrives.
//! - `delay > 0`: patches accumulate in an ordered buffer. The first patch
//!   to arrive while the buffer is empty schedules a single one-shot
//!   timer; later patches append without resetting it. When the timer
//!   fires, the buffer drains into one `patch-batch` message preserving
//!   insertion order, and the next patch starts a fresh cycle.
//!
//! If the task driving the batcher is dropped with patches still
//! buffered, they are lost — per §4.2 this is accepted: a reconnecting
//! client resyncs via the next `complete` handshake rather than replaying
//! a buffered delta.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use yuzu_core::{Patch, ServerMessage};

/// Drives the batching policy for one tracker's patch stream, broadcasting
/// finished messages to every open connection via `out`.
///
/// Run as a background task via [`PatchBatcher::run`]; it owns the
/// receiving end of the tracker's patch channel. `out` has no receivers
/// when no clients are connected, which is not an error — there is simply
/// nobody to broadcast to.
pub struct PatchBatcher {
    delay: Duration,
    patches: mpsc::UnboundedReceiver<Patch>,
    out: broadcast::Sender<ServerMessage>,
}

impl PatchBatcher {
    pub fn new(
        delay: Duration,
        patches: mpsc::UnboundedReceiver<Patch>,
        out: broadcast::Sender<ServerMessage>,
    ) -> Self {
        PatchBatcher { delay, patches, out }
    }

    /// Run until the patch channel closes (tracker dropped).
    pub async fn run(mut self) {
        if self.delay.is_zero() {
            while let Some(patch) = self.patches.recv().await {
                let _ = self.out.send(ServerMessage::patch(patch));
            }
            return;
        }

        let mut buffer: Vec<Patch> = Vec::new();
        loop {
            if buffer.is_empty() {
                match self.patches.recv().await {
                    Some(patch) => buffer.push(patch),
                    None => return,
                }
            }

            let timer = sleep(self.delay);
            tokio::pin!(timer);
            loop {
                tokio::select! {
                    _ = &mut timer => break,
                    maybe_patch = self.patches.recv() => {
                        match maybe_patch {
                            Some(patch) => buffer.push(patch),
                            None => {
                                if !buffer.is_empty() {
                                    let _ = self.out.send(ServerMessage::patch_batch(std::mem::take(&mut buffer)));
                                }
                                return;
                            }
                        }
                    }
                }
            }

            let _ = self.out.send(ServerMessage::patch_batch(std::mem::take(&mut buffer)));
        }
    }
}
