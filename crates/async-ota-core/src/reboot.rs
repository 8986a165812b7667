//! Deferred restart after a finished upload.
//!
//! The request handler only records when the restart was asked for, a
//! periodic task polls the scheduler and restarts once the delay is over.
//! This gives the TCP stack time to flush the final response.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::ports::SystemRestart;

/// Delay between the final response and the restart
pub const REBOOT_DELAY_MS: u32 = 2000;

pub struct RebootScheduler {
    pending: AtomicBool,
    requested_at: AtomicU32,
}

impl RebootScheduler {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            requested_at: AtomicU32::new(0),
        }
    }

    /// Ask for a restart. A second request moves the deadline.
    pub fn request(&self, now_ms: u32) {
        self.requested_at.store(now_ms, Ordering::Release);
        self.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Restart if a request is older than [`REBOOT_DELAY_MS`].
    ///
    /// Returns `true` when the restart was triggered. Tick wrap-around is
    /// handled, so a request made just before the counter overflows still
    /// fires on time.
    pub fn poll(&self, now_ms: u32, system: &impl SystemRestart) -> bool {
        if !self.is_pending() {
            return false;
        }
        let elapsed = now_ms.wrapping_sub(self.requested_at.load(Ordering::Acquire));
        if elapsed < REBOOT_DELAY_MS {
            return false;
        }
        if self
            .pending
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        log::info!("reboot: restarting after update");
        system.restart();
        true
    }
}

impl Default for RebootScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    #[derive(Default)]
    struct CountingRestart(Cell<u32>);

    impl SystemRestart for CountingRestart {
        fn restart(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn nothing_happens_without_request() {
        let scheduler = RebootScheduler::new();
        let system = CountingRestart::default();
        assert!(!scheduler.poll(10_000, &system));
        assert_eq!(system.0.get(), 0);
    }

    #[test]
    fn restart_waits_for_delay() {
        let scheduler = RebootScheduler::new();
        let system = CountingRestart::default();
        scheduler.request(1000);
        assert!(!scheduler.poll(1000, &system));
        assert!(!scheduler.poll(2999, &system));
        assert!(scheduler.poll(3000, &system));
        assert_eq!(system.0.get(), 1);
    }

    #[test]
    fn restart_fires_once() {
        let scheduler = RebootScheduler::new();
        let system = CountingRestart::default();
        scheduler.request(0);
        assert!(scheduler.poll(5000, &system));
        assert!(!scheduler.poll(6000, &system));
        assert!(!scheduler.is_pending());
        assert_eq!(system.0.get(), 1);
    }

    #[test]
    fn tick_wraparound_is_handled() {
        let scheduler = RebootScheduler::new();
        let system = CountingRestart::default();
        scheduler.request(u32::MAX - 500);
        assert!(!scheduler.poll(1000, &system));
        assert!(scheduler.poll(1500, &system));
    }

    #[test]
    fn second_request_moves_deadline() {
        let scheduler = RebootScheduler::new();
        let system = CountingRestart::default();
        scheduler.request(0);
        scheduler.request(1500);
        assert!(!scheduler.poll(2500, &system));
        assert!(scheduler.poll(3500, &system));
    }
}
