//! Ticker: dedicated thread generating frame ticks.
//!
//! This is the real-time [`FrameClock`]. It only produces timing values;
//! all actor processing stays on the thread that owns the
//! [`System`](crate::System).

use super::frame::{frame_time, FrameClock};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest sleep between two shutdown checks.
const SHUTDOWN_POLL: Duration = Duration::from_millis(5);

/// A tick event sent at regular intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Frame number (monotonically increasing).
    pub frame: u64,
    /// Time elapsed since the clock was started.
    pub elapsed: Duration,
}

/// Clock thread that emits [`Tick`]s at a fixed interval.
pub struct Ticker {
    /// Handle to the ticker thread.
    handle: Option<JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
    /// Receiver for tick events.
    tick_rx: Receiver<Tick>,
    /// Remaining ticks before `next_tick` reports exhaustion.
    limit: Option<u64>,
}

impl Ticker {
    /// Spawn a ticker with the given interval (e.g. 16ms for ~60 FPS).
    ///
    /// # Errors
    ///
    /// Returns an error if the OS fails to spawn the ticker thread.
    pub fn spawn(interval: Duration) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        // Small buffer: a slow consumer skips frames instead of queueing them
        let (tick_tx, tick_rx) = bounded(2);

        let handle = thread::Builder::new()
            .name("triad-ticker".to_string())
            .spawn(move || {
                Self::run_loop(&tick_tx, &shutdown_clone, interval);
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            tick_rx,
            limit: None,
        })
    }

    /// Stop reporting ticks after `frames` of them.
    #[must_use]
    pub fn take(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Get a reference to the tick receiver.
    #[inline]
    pub const fn receiver(&self) -> &Receiver<Tick> {
        &self.tick_rx
    }

    /// Signal the ticker to shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the ticker thread to finish.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Send one tick per interval until shut down.
    ///
    /// Frame `n` is due `(n + 1) * interval` after start. A tick that finds
    /// the buffer full is lost, and frames that fell due while the thread
    /// was late are skipped, so `frame` may jump.
    fn run_loop(tick_tx: &Sender<Tick>, shutdown: &AtomicBool, interval: Duration) {
        let start = Instant::now();
        let mut frame = 0u64;

        while !shutdown.load(Ordering::Relaxed) {
            let Some(due) = start.checked_add(frame_time(interval, frame)) else {
                break;
            };
            let now = Instant::now();
            if now < due {
                thread::sleep((due - now).min(SHUTDOWN_POLL));
                continue;
            }

            let elapsed = now - start;
            if let Err(TrySendError::Disconnected(_)) = tick_tx.try_send(Tick { frame, elapsed }) {
                break;
            }
            frame = (frame + 1).max(frames_before(elapsed, interval));
        }
    }
}

/// Number of whole intervals in `elapsed`.
fn frames_before(elapsed: Duration, interval: Duration) -> u64 {
    let whole = elapsed.as_nanos() / interval.as_nanos().max(1);
    u64::try_from(whole).unwrap_or(u64::MAX)
}

impl FrameClock for Ticker {
    fn next_tick(&mut self) -> Option<Tick> {
        match self.limit {
            Some(0) => return None,
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        self.tick_rx.recv().ok()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
