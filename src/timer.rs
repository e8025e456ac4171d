use std::time::{Duration, Instant};

/// A one-shot deadline owned by the UI state. Nothing fires on its own: the
/// event loop asks for the earliest deadline and polls `fire` when woken.
#[derive(Debug, Default, Clone, Copy)]
pub struct Timer {
    due: Option<Instant>,
}

impl Timer {
    pub fn start(&mut self, now: Instant, after: Duration) {
        self.due = Some(now + after);
    }

    pub fn clear(&mut self) {
        self.due = None;
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    /// True exactly once, on the first poll at or after the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

/// Re-entrancy guard for gestures: engaged for a fixed settle period, then
/// released by the timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct GestureLock {
    release: Timer,
}

impl GestureLock {
    pub fn engage(&mut self, now: Instant, settle: Duration) {
        self.release.start(now, settle);
    }

    /// Releases the lock if its settle period is over.
    pub fn is_engaged(&mut self, now: Instant) -> bool {
        if self.release.fire(now) {
            log::debug!("gesture lock released");
        }
        self.release.is_pending()
    }

    pub fn due(&self) -> Option<Instant> {
        self.release.due()
    }

    pub fn clear(&mut self) {
        self.release.clear();
    }
}
