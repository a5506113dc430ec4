// t1link/src/utils/timeout.rs
//! Timing helpers for the host-facing call conventions.

use std::time::Duration;

/// Non-blocking hosts must call `Connection::pump` at least this often while
/// a card is connected or connecting. The blocking convention uses the same
/// interval as its spin-poll period.
pub const POLL_INTERVAL_MS: u32 = 50;

/// Convert milliseconds to Duration.
pub fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
