//! Cancellable deadlines on the local microsecond timeline
//!
//! Components own their deadlines and the player driver sleeps until the
//! earliest armed one. Disarming is all cancellation takes.

/// A single optional wake-up time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<i64>,
}

impl Deadline {
    pub const fn idle() -> Self {
        Self { at: None }
    }

    /// Arm (or re-arm) at `at_us`
    pub fn arm(&mut self, at_us: i64) {
        self.at = Some(at_us);
    }

    /// Arm only if not already armed. Returns true if this call armed it.
    pub fn arm_if_idle(&mut self, at_us: i64) -> bool {
        if self.at.is_some() {
            return false;
        }
        self.at = Some(at_us);
        true
    }

    pub fn disarm(&mut self) {
        self.at = None;
    }

    pub fn at(&self) -> Option<i64> {
        self.at
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn is_due(&self, now_us: i64) -> bool {
        matches!(self.at, Some(at) if at <= now_us)
    }
}

/// Earlier of two optional times
pub fn earliest(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
