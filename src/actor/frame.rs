//! Frame-aligned scheduling.
//!
//! Actors never talk to a display clock directly. They hand callbacks to a
//! [`FrameScheduler`]; the system fires them when its [`FrameClock`] ticks.

use super::ticker::Tick;
use crate::error::Result;
use std::cell::{Cell, RefCell};
use std::time::Duration;

/// Deferred work that runs on the next frame.
pub type FrameCallback = Box<dyn FnOnce(Tick) -> Result<()>>;

/// Something that can defer a callback to the next frame.
pub trait FrameScheduler {
    /// Run `callback` on the next frame, never immediately.
    fn schedule(&self, callback: FrameCallback);
}

/// Source of frame ticks driving [`System::run`](crate::System::run).
pub trait FrameClock {
    /// Block until the next tick. `None` ends the run loop.
    fn next_tick(&mut self) -> Option<Tick>;
}

/// Time at the end of `frame`, saturating at [`Duration::MAX`].
pub(crate) fn frame_time(interval: Duration, frame: u64) -> Duration {
    u32::try_from(frame.saturating_add(1))
        .ok()
        .and_then(|frames| interval.checked_mul(frames))
        .unwrap_or(Duration::MAX)
}

/// Built-in scheduler: a queue flushed once per frame.
#[derive(Default)]
pub struct FrameQueue {
    pending: RefCell<Vec<FrameCallback>>,
    flushed: Cell<u64>,
}

impl FrameQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Number of frames flushed so far.
    pub fn frames(&self) -> u64 {
        self.flushed.get()
    }

    /// Run every callback scheduled before this call.
    ///
    /// Callbacks scheduled while flushing wait for the next frame. If a
    /// callback fails, the ones after it stay queued and the error is
    /// returned.
    pub fn flush(&self, tick: Tick) -> Result<usize> {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        self.flushed.set(self.flushed.get() + 1);

        let mut ran = 0;
        let mut callbacks = batch.into_iter();
        while let Some(callback) = callbacks.next() {
            if let Err(e) = callback(tick) {
                self.pending.borrow_mut().splice(0..0, callbacks);
                return Err(e);
            }
            ran += 1;
        }
        Ok(ran)
    }
}

impl FrameScheduler for FrameQueue {
    fn schedule(&self, callback: FrameCallback) {
        self.pending.borrow_mut().push(callback);
    }
}

/// Deterministic clock yielding a fixed number of evenly spaced ticks.
#[derive(Debug, Clone)]
pub struct ManualClock {
    interval: Duration,
    frame: u64,
    remaining: u64,
}

impl ManualClock {
    /// A clock that ticks `frames` times, `interval` apart.
    pub const fn new(frames: u64, interval: Duration) -> Self {
        Self {
            interval,
            frame: 0,
            remaining: frames,
        }
    }
}

impl FrameClock for ManualClock {
    fn next_tick(&mut self) -> Option<Tick> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let frame = self.frame;
        self.frame += 1;
        let elapsed = frame_time(self.interval, frame);
        Some(Tick { frame, elapsed })
    }
}
