//! Fixed-window gate in front of the remote classifier.
//!
//! The window resets lazily on the first acquire attempt after expiry; there
//! is no background timer. Denial is instantaneous — callers shed to the
//! heuristic classifier instead of queueing or retrying.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Window length. Matches the remote service's per-minute quota accounting.
const WINDOW: Duration = Duration::from_secs(60);

struct Window {
    count: u32,
    opened_at: Instant,
}

/// Fixed-window request limiter. Internally synchronized; safe to call from
/// any number of concurrent in-flight resolutions.
pub struct FixedWindowLimiter {
    capacity: u32,
    window: Mutex<Window>,
}

impl FixedWindowLimiter {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            window: Mutex::new(Window {
                count: 0,
                opened_at: Instant::now(),
            }),
        }
    }

    /// Claim one slot in the current window. Returns `false` without blocking
    /// when the window is exhausted. An admitted call consumes its slot
    /// whether or not the guarded request later succeeds.
    pub fn try_acquire(&self) -> bool {
        let mut w = self.window.lock().expect("limiter lock poisoned");
        if w.opened_at.elapsed() >= WINDOW {
            w.count = 0;
            w.opened_at = Instant::now();
        }
        if w.count >= self.capacity {
            return false;
        }
        w.count += 1;
        true
    }

    /// Requests admitted in the current window (diagnostic).
    pub fn current_count(&self) -> u32 {
        self.window.lock().expect("limiter lock poisoned").count
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Force the window into the expired state (test hook).
    #[cfg(test)]
    fn expire_window(&self) {
        let mut w = self.window.lock().unwrap();
        w.opened_at = Instant::now() - WINDOW - Duration::from_millis(1);
    }
}
