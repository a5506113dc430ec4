// t1link/src/types.rs

use crate::constants::{TS_DIRECT, TS_INVERSE};
use crate::Error;

/// Bit coding convention announced by the TS byte of the ATR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// TS = 0x3B
    Direct,
    /// TS = 0x3F
    Inverse,
}

impl TryFrom<u8> for Convention {
    type Error = Error;

    fn try_from(ts: u8) -> Result<Self, Self::Error> {
        match ts {
            TS_DIRECT => Ok(Self::Direct),
            TS_INVERSE => Ok(Self::Inverse),
            other => Err(Error::BadConvention(other)),
        }
    }
}

/// Transmission protocols a card can declare in its ATR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Character-oriented T=0
    T0,
    /// Block-oriented T=1 (the one this crate speaks)
    T1,
}

impl Protocol {
    /// Protocol number as used in TD qualifier nibbles and PPS0
    pub fn number(self) -> u8 {
        match self {
            Self::T0 => 0,
            Self::T1 => 1,
        }
    }
}

/// Error detection code appended to each block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumKind {
    /// One-byte XOR (the T=1 default)
    #[default]
    Lrc,
    /// Two-byte CRC-16, ISO/IEC 3309 polynomial
    Crc16,
}

impl ChecksumKind {
    /// Trailer length in bytes for this code
    pub fn len(self) -> usize {
        match self {
            Self::Lrc => 1,
            Self::Crc16 => 2,
        }
    }
}
