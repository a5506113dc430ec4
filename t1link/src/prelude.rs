// t1link/src/prelude.rs
//! Convenience re-exports for typical hosts.

pub use crate::config::{Config, Param, ParamValue};
pub use crate::protocol::atr::Atr;
pub use crate::protocol::block::{Block, RAck, SCommand};
pub use crate::protocol::engine::{ByteSink, Engine, EngineState, Event};
pub use crate::reader::{Connection, LinkObserver, Reader};
pub use crate::transport::{
    BulkPipe, CardTransport, CcidTransport, LineConfig, MockTransport, SerialTransport,
    SmartCardPort, T1Parameters,
};
pub use crate::{ChecksumKind, Convention, Error, Protocol, Result};

// Re-export small utilities for convenience
pub use crate::utils::{bytes_to_hex, bytes_to_hex_spaced, ms, POLL_INTERVAL_MS};
