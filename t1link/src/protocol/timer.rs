// t1link/src/protocol/timer.rs
//! Saturating countdown timers driven by host-supplied elapsed-ms ticks.
//!
//! A countdown only reports expiry once it has seen at least two nonzero
//! tick deliveries. Hosts commonly initialize a timer and immediately call
//! the tick entry point with a near-zero elapsed value; without the guard
//! that first call could report a spurious immediate expiry.

/// One countdown timer
#[derive(Debug, Clone, Copy, Default)]
pub struct Countdown {
    remaining: u32,
    running: bool,
    nonzero_ticks: u8,
}

impl Countdown {
    /// A stopped timer
    pub fn idle() -> Self {
        Self::default()
    }

    /// Arm the countdown with `ms` milliseconds
    pub fn start(&mut self, ms: u32) {
        self.remaining = ms;
        self.running = true;
        self.nonzero_ticks = 0;
    }

    /// Disarm without firing
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// True while armed
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Milliseconds left (saturated at zero)
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Advance by `elapsed` ms. Returns true exactly once, when the timer
    /// fires; the timer disarms itself at that point.
    pub fn tick(&mut self, elapsed: u32) -> bool {
        if !self.running || elapsed == 0 {
            return false;
        }
        self.nonzero_ticks = self.nonzero_ticks.saturating_add(1).min(2);
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.nonzero_ticks >= 2 && self.remaining == 0 {
            self.running = false;
            return true;
        }
        false
    }
}
