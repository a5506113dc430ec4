// t1link/src/error.rs

use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    // USB 実装 is behind the optional `usb` feature so the protocol core
    // builds without libusb present.
    #[cfg(feature = "usb")]
    #[error("usb error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("transport write failed after {attempts} attempts")]
    OutputFailure { attempts: u8 },

    #[error("card aborted the exchange")]
    Aborted,

    #[error("communication failure: retries exhausted")]
    CommFailure,

    #[error("no ATR received within {timeout_ms} ms")]
    AtrTimeout { timeout_ms: u32 },

    #[error("malformed ATR: {0}")]
    BadAtr(&'static str),

    #[error("ATR checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    AtrChecksum { expected: u8, actual: u8 },

    #[error("unsupported ATR convention byte {0:#04x}")]
    BadConvention(u8),

    #[error("PPS exchange failed")]
    PpsFailed,

    #[error("IFSD negotiation failed")]
    IfsdFailed,

    #[error("block checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("invalid block length {0}")]
    InvalidBlockLength(usize),

    #[error("unrecognized block: pcb={pcb:#04x}")]
    UnrecognizedBlock { pcb: u8 },

    #[error("reassembled APDU exceeds {max} bytes")]
    OversizedApdu { max: usize },

    #[error("information field too long: {len} > IFSC {ifsc}")]
    InfTooLong { len: usize, ifsc: usize },

    #[error("parameter {name} out of range: {value} not in {min}..={max}")]
    ParamOutOfRange {
        name: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("ccid frame error: {0}")]
    CcidFrame(&'static str),

    #[error("card removed")]
    CardRemoved,

    #[error("no card present")]
    NoCard,

    #[error("not connected")]
    NotConnected,

    #[error("an exchange is already in progress")]
    Busy,

    #[error("protocol engine is in the error state; reset required")]
    EngineHalted,

    #[error("operation timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(&'static str),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
