//! Single-slot frame hand-off between the capture side and the worker.
//!
//! Submitting overwrites any frame the worker has not picked up yet; the
//! worker takes frames *out* of the slot, so the frame it is detecting on
//! can never be touched by a later submit.

use std::time::{Duration, Instant};

use ar_markers_core::RgbaFrame;
use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct Slot {
    frame: Option<RgbaFrame>,
    submitted: u64,
    dropped: u64,
    closed: bool,
}

/// Latest-frame-wins mailbox guarded by its own lock.
#[derive(Default)]
pub struct ImageMailbox {
    slot: Mutex<Slot>,
    arrived: Condvar,
}

impl ImageMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` as the latest one. Returns `true` if an unconsumed frame
    /// was replaced.
    pub fn submit(&self, frame: RgbaFrame) -> bool {
        let mut slot = self.slot.lock();
        let replaced = slot.frame.replace(frame).is_some();
        slot.submitted += 1;
        if replaced {
            slot.dropped += 1;
        }
        drop(slot);
        self.arrived.notify_one();
        replaced
    }

    /// Take the pending frame without waiting.
    pub fn take(&self) -> Option<RgbaFrame> {
        self.slot.lock().frame.take()
    }

    /// Wait up to `timeout` for a frame and take it.
    ///
    /// Returns `None` on timeout or once the mailbox is closed and empty.
    pub fn wait_take(&self, timeout: Duration) -> Option<RgbaFrame> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.frame.is_none() && !slot.closed {
            if self.arrived.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.frame.take()
    }

    /// Wake every waiter; later waits return immediately.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.arrived.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Total number of frames submitted so far.
    pub fn submitted(&self) -> u64 {
        self.slot.lock().submitted
    }

    /// Frames overwritten before the worker picked them up.
    pub fn dropped(&self) -> u64 {
        self.slot.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn frame(fill: u8) -> RgbaFrame {
        RgbaFrame::from_raw(2, 1, vec![fill; 8]).unwrap()
    }

    #[test]
    fn keeps_only_latest_frame() {
        let mailbox = ImageMailbox::new();
        assert!(!mailbox.submit(frame(1)));
        assert!(mailbox.submit(frame(2)));
        assert_eq!(mailbox.take(), Some(frame(2)));
        assert_eq!(mailbox.take(), None);
        assert_eq!(mailbox.submitted(), 2);
        assert_eq!(mailbox.dropped(), 1);
    }

    #[test]
    fn wait_take_times_out_when_empty() {
        let mailbox = ImageMailbox::new();
        let start = Instant::now();
        assert!(mailbox.wait_take(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_take_wakes_on_submit() {
        let mailbox = Arc::new(ImageMailbox::new());
        let producer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                mailbox.submit(frame(9));
            })
        };
        let got = mailbox.wait_take(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(got, Some(frame(9)));
    }

    #[test]
    fn close_releases_waiters() {
        let mailbox = Arc::new(ImageMailbox::new());
        let closer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                mailbox.close();
            })
        };
        let start = Instant::now();
        assert!(mailbox.wait_take(Duration::from_secs(5)).is_none());
        closer.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(mailbox.is_closed());
    }
}
