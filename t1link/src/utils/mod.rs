// t1link/src/utils/mod.rs
//! Small helpers shared across the crate: hex formatting for wire traces
//! and the polling-interval constants of the blocking call convention.

pub mod hex;
pub mod timeout;

pub use hex::*;
pub use timeout::*;
