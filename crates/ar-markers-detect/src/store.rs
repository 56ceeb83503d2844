//! Versioned marker snapshot shared between the worker and the consumer.
//!
//! One mutex guards the marker list, the version counter and the ready flag
//! together, so a drain always sees exactly one detection cycle. The ready
//! flag is set by `publish` and cleared by `drain`; a condition variable
//! wakes whichever side is waiting on it.

use std::time::{Duration, Instant};

use ar_markers_core::{MarkerObservation, MarkerSnapshot};
use parking_lot::{Condvar, Mutex};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Default)]
struct Slot {
    snapshot: MarkerSnapshot,
    ready: bool,
    closed: bool,
}

/// Single-slot, versioned marker store.
#[derive(Default)]
pub struct MarkerStore {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored markers with a new detection cycle and mark the
    /// snapshot ready. Returns the new version.
    pub fn publish(&self, markers: Vec<MarkerObservation>) -> u64 {
        let mut slot = self.slot.lock();
        slot.snapshot.markers = markers;
        slot.snapshot.version += 1;
        slot.ready = true;
        let version = slot.snapshot.version;
        drop(slot);
        self.changed.notify_all();
        version
    }

    /// Wait up to `timeout` for a ready snapshot, copy it out and clear the
    /// ready flag.
    ///
    /// Returns `None` if nothing was published in time or the store was
    /// closed without a pending snapshot.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn drain(&self, timeout: Duration) -> Option<MarkerSnapshot> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while !slot.ready && !slot.closed {
            if self.changed.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        if !slot.ready {
            return None;
        }
        slot.ready = false;
        let snapshot = slot.snapshot.clone();
        drop(slot);
        self.changed.notify_all();
        Some(snapshot)
    }

    /// Non-blocking [`drain`](Self::drain).
    pub fn try_drain(&self) -> Option<MarkerSnapshot> {
        self.drain(Duration::ZERO)
    }

    /// Worker-side gate: wait up to `timeout` until the consumer has drained
    /// the pending snapshot. Returns `true` if the slot may be overwritten.
    pub fn wait_consumed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.ready && !slot.closed {
            if self.changed.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        !slot.ready && !slot.closed
    }

    /// Wake every waiter; no further waits block.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    pub fn is_ready(&self) -> bool {
        self.slot.lock().ready
    }

    /// Version of the latest published cycle (0 before the first publish).
    pub fn version(&self) -> u64 {
        self.slot.lock().snapshot.version
    }
}
