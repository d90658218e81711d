use chrono::{Timelike, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Source of the current second within the minute (0..=59).
pub trait WallClock: Send + Sync {
    fn second_of_minute(&self) -> u32;
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn second_of_minute(&self) -> u32 {
        // Leap seconds surface as 60 in chrono; fold them into 59.
        Utc::now().second().min(59)
    }
}

/// Clock whose second is set by hand. Clones share the same value.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    second: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(second: u32) -> Self {
        Self {
            second: Arc::new(AtomicU32::new(second % 60)),
        }
    }

    pub fn set_second(&self, second: u32) {
        self.second.store(second % 60, Ordering::SeqCst);
    }

    /// Step forward one second, wrapping at the minute.
    pub fn advance(&self) -> u32 {
        let next = (self.second.load(Ordering::SeqCst) + 1) % 60;
        self.second.store(next, Ordering::SeqCst);
        next
    }
}

impl WallClock for ManualClock {
    fn second_of_minute(&self) -> u32 {
        self.second.load(Ordering::SeqCst)
    }
}
