// t1link/src/config.rs
//! Engine configuration: a table of named parameters, each with a permitted
//! range and a default. Configuration is always passed explicitly into
//! constructors; there is no ambient global state.

use crate::types::ChecksumKind;
use crate::{Error, Result};

/// Named configuration parameters of the protocol engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Silence between two bytes of one block, in ms
    InterByteTimeout,
    /// Window for the first ATR byte after activation, in ms
    AtrTimeout,
    /// Window for the card's response to a sent block, in ms
    ResponseTimeout,
    /// Hard ceiling the WTX multiplier may stretch the response window to, ms
    MaxResponseTimeout,
    /// Information field size accepted by the card, bytes
    Ifsc,
    /// Information field size accepted by this device, bytes
    Ifsd,
    /// Error detection code: 0 = LRC, 1 = CRC-16
    Checksum,
    /// 1 if the reader negotiates PPS itself and the engine must skip it
    AutoPps,
    /// Ceiling on a reassembled response APDU, bytes
    MaxApduLen,
}

/// How a parameter is updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamValue {
    /// Set to an explicit value (range-checked)
    Value(u32),
    /// Reset to the built-in default
    Default,
    /// Leave as-is
    Unchanged,
}

struct Descriptor {
    name: &'static str,
    min: u32,
    max: u32,
    default: u32,
}

const fn descriptor(param: Param) -> Descriptor {
    match param {
        Param::InterByteTimeout => Descriptor {
            name: "inter_byte_timeout_ms",
            min: 1,
            max: 10_000,
            default: 100,
        },
        Param::AtrTimeout => Descriptor {
            name: "atr_timeout_ms",
            min: 1,
            max: 30_000,
            default: 1_000,
        },
        Param::ResponseTimeout => Descriptor {
            name: "response_timeout_ms",
            min: 1,
            max: 60_000,
            default: 300,
        },
        Param::MaxResponseTimeout => Descriptor {
            name: "max_response_timeout_ms",
            min: 1,
            max: 600_000,
            default: 3_000,
        },
        Param::Ifsc => Descriptor {
            name: "ifsc",
            min: 1,
            max: 254,
            default: 32,
        },
        Param::Ifsd => Descriptor {
            name: "ifsd",
            min: 1,
            max: 254,
            default: 254,
        },
        Param::Checksum => Descriptor {
            name: "checksum",
            min: 0,
            max: 1,
            default: 0,
        },
        Param::AutoPps => Descriptor {
            name: "auto_pps",
            min: 0,
            max: 1,
            default: 0,
        },
        Param::MaxApduLen => Descriptor {
            name: "max_apdu_len",
            min: 254,
            // extended APDU body + status word
            max: 65_538,
            default: 65_538,
        },
    }
}

const ALL_PARAMS: [Param; 9] = [
    Param::InterByteTimeout,
    Param::AtrTimeout,
    Param::ResponseTimeout,
    Param::MaxResponseTimeout,
    Param::Ifsc,
    Param::Ifsd,
    Param::Checksum,
    Param::AutoPps,
    Param::MaxApduLen,
];

/// Engine configuration table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    values: [u32; ALL_PARAMS.len()],
}

impl Default for Config {
    fn default() -> Self {
        let mut values = [0u32; ALL_PARAMS.len()];
        for (slot, param) in values.iter_mut().zip(ALL_PARAMS) {
            *slot = descriptor(param).default;
        }
        Self { values }
    }
}

impl Config {
    fn index(param: Param) -> usize {
        // ALL_PARAMS is in declaration order
        param as usize
    }

    /// Current value of a parameter
    pub fn get(&self, param: Param) -> u32 {
        self.values[Self::index(param)]
    }

    /// Update a parameter. `Value` is rejected when outside the permitted
    /// range; `Default` restores the built-in default; `Unchanged` is a no-op.
    pub fn set(&mut self, param: Param, value: ParamValue) -> Result<()> {
        let desc = descriptor(param);
        match value {
            ParamValue::Value(v) => {
                if v < desc.min || v > desc.max {
                    return Err(Error::ParamOutOfRange {
                        name: desc.name,
                        value: v,
                        min: desc.min,
                        max: desc.max,
                    });
                }
                self.values[Self::index(param)] = v;
            }
            ParamValue::Default => self.values[Self::index(param)] = desc.default,
            ParamValue::Unchanged => {}
        }
        Ok(())
    }

    /// Checksum algorithm selected by the `Checksum` parameter
    pub fn checksum(&self) -> ChecksumKind {
        if self.get(Param::Checksum) == 0 {
            ChecksumKind::Lrc
        } else {
            ChecksumKind::Crc16
        }
    }

    /// IFSC as usize for length comparisons
    pub fn ifsc(&self) -> usize {
        self.get(Param::Ifsc) as usize
    }

    /// IFSD as usize
    pub fn ifsd(&self) -> usize {
        self.get(Param::Ifsd) as usize
    }

    /// True when the transport negotiates PPS itself
    pub fn auto_pps(&self) -> bool {
        self.get(Param::AutoPps) != 0
    }
}
