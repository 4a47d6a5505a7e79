//! Runtime configuration.

use std::time::Duration;

/// Configuration for a [`System`](crate::System).
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Target frames per second for scheduled renders.
    pub target_fps: u32,
    /// Log every processed event at `info` level instead of `debug`.
    pub inspect: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            inspect: false,
        }
    }
}

impl SystemConfig {
    /// Enable per-event inspection logging.
    pub const fn with_inspect(mut self, inspect: bool) -> Self {
        self.inspect = inspect;
        self
    }

    /// Set the target frame rate.
    pub const fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Time between two frames. A zero frame rate is treated as 1 fps.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}
