// t1link/src/lib.rs

//! t1link
//!
//! Host-side ISO/IEC 7816-3 T=1 transport: block framing with LRC/CRC-16
//! error detection, ATR decoding, PPS and IFSD negotiation, chaining,
//! retransmission and resynchronization, over serial or USB-CCID readers.
#![warn(missing_docs)]

pub mod config;
pub mod constants;
pub mod error;
pub mod prelude;
pub mod protocol;
pub mod reader;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export common types at crate root so `crate::Error`, `crate::Result`,
// and the newtypes in `types` are available for consumers and for
// convenient `prelude` re-exports.
pub use crate::error::*;
pub use crate::types::*;

pub use prelude::*;
