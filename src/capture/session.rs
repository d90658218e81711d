use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Active flag plus a consecutive-failure budget shared by the frame sources.
/// Running out of budget ends the capture, the same way a capture track ends
/// when the captured window closes.
#[derive(Debug)]
pub struct CaptureSession {
    active: AtomicBool,
    failures: AtomicU32,
    max_failures: u32,
}

impl CaptureSession {
    pub fn new(max_failures: u32) -> Self {
        Self {
            active: AtomicBool::new(false),
            failures: AtomicU32::new(0),
            max_failures: max_failures.max(1),
        }
    }

    pub fn activate(&self) {
        self.failures.store(0, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }

    /// Returns true if the session was active.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }

    /// Count a failed frame. Returns the running count and whether the
    /// session just ended because of it.
    pub fn record_failure(&self) -> (u32, bool) {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        let ended = failures >= self.max_failures && self.deactivate();
        (failures, ended)
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }
}
