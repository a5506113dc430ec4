// t1link/src/protocol/atr.rs
//! Answer To Reset decoder.
//!
//! The ATR is TS, T0, then interface byte groups TA/TB/TC/TD whose presence
//! is announced by the indicator nibble of the previous TD (or T0 for the
//! first group), then historical bytes, then TCK whenever any protocol other
//! than lone T=0 was declared. Interface bytes land in one of two classes:
//! "global" (first two groups plus any T=15 group) or "T=1-specific", each
//! with up to three TA/TB/TC triples.

use crate::constants::ATR_MAX_IB;
use crate::types::{Convention, Protocol};
use crate::{Error, Result};

/// Interface byte class, selecting one of the two slot tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IbClass {
    Global,
    T1,
    Other,
}

/// Decoded Answer To Reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atr {
    raw: Vec<u8>,
    convention: Convention,
    globals: [Option<u8>; ATR_MAX_IB],
    t1: [Option<u8>; ATR_MAX_IB],
    supports_t0: bool,
    supports_t1: bool,
    ta2: Option<u8>,
    historical: Vec<u8>,
}

fn need(bytes: &[u8], idx: usize) -> Result<u8> {
    bytes
        .get(idx)
        .copied()
        .ok_or(Error::BadAtr("truncated interface bytes"))
}

impl Atr {
    /// Decode a raw ATR byte sequence (typically 2-33 bytes).
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::BadAtr("shorter than TS + T0"));
        }

        let convention = Convention::try_from(bytes[0])?;
        let t0 = bytes[1];
        let hist_len = usize::from(t0 & 0x0F);

        let mut atr = Self {
            raw: bytes.to_vec(),
            convention,
            globals: [None; ATR_MAX_IB],
            t1: [None; ATR_MAX_IB],
            supports_t0: false,
            supports_t1: false,
            ta2: None,
            historical: Vec::new(),
        };

        // Triples already filled per class, capping each table at 3 groups
        let mut filled = [0usize; 2];
        let mut indicator = t0 >> 4;
        let mut group = 1usize;
        let mut class = IbClass::Global;
        let mut tck_required = false;
        let mut i = 2usize;

        loop {
            let base = match class {
                IbClass::Global => Some(filled[0] * 3),
                IbClass::T1 => Some(filled[1] * 3),
                IbClass::Other => None,
            };

            for (bit, offset) in [(1u8, 0usize), (2, 1), (4, 2)] {
                if indicator & bit == 0 {
                    continue;
                }
                let value = need(bytes, i)?;
                i += 1;
                if group == 2 && bit == 1 {
                    atr.ta2 = Some(value);
                }
                if let Some(base) = base {
                    atr.store_ib(class, base + offset, value);
                }
            }
            match class {
                IbClass::Global => filled[0] += 1,
                IbClass::T1 => filled[1] += 1,
                IbClass::Other => {}
            }

            if indicator & 8 == 0 {
                break;
            }
            let td = need(bytes, i)?;
            i += 1;

            let qualifier = td & 0x0F;
            match qualifier {
                0 => atr.supports_t0 = true,
                1 => atr.supports_t1 = true,
                _ => {}
            }
            // TCK closes the ATR unless the card declared nothing but T=0
            if qualifier != 0 {
                tck_required = true;
            }

            group += 1;
            class = if group == 2 || qualifier == 15 {
                IbClass::Global
            } else if qualifier == Protocol::T1.number() {
                IbClass::T1
            } else {
                IbClass::Other
            };
            indicator = td >> 4;
        }

        if bytes.len() < i + hist_len {
            return Err(Error::BadAtr("truncated historical bytes"));
        }
        atr.historical = bytes[i..i + hist_len].to_vec();
        i += hist_len;

        if tck_required {
            let tck = need(bytes, i)
                .map_err(|_| Error::BadAtr("missing TCK"))?;
            let expected = bytes[1..i].iter().fold(0u8, |acc, &b| acc ^ b);
            if expected != tck {
                return Err(Error::AtrChecksum {
                    expected,
                    actual: tck,
                });
            }
        }

        Ok(atr)
    }

    fn store_ib(&mut self, class: IbClass, slot: usize, value: u8) {
        let table = match class {
            IbClass::Global => &mut self.globals,
            IbClass::T1 => &mut self.t1,
            IbClass::Other => return,
        };
        if slot < ATR_MAX_IB {
            table[slot] = Some(value);
        }
    }

    /// Raw bytes the ATR was decoded from
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Bit coding convention from TS
    pub fn convention(&self) -> Convention {
        self.convention
    }

    /// True when the card declared T=0
    pub fn supports_t0(&self) -> bool {
        self.supports_t0
    }

    /// True when the card declared T=1
    pub fn supports_t1(&self) -> bool {
        self.supports_t1
    }

    /// Global interface byte slot (TA/TB/TC of up to three global groups)
    pub fn global_ib(&self, slot: usize) -> Option<u8> {
        self.globals.get(slot).copied().flatten()
    }

    /// T=1-specific interface byte slot
    pub fn t1_ib(&self, slot: usize) -> Option<u8> {
        self.t1.get(slot).copied().flatten()
    }

    /// Historical bytes
    pub fn historical(&self) -> &[u8] {
        &self.historical
    }

    /// TA2 presence means the card is locked in specific mode and PPS must
    /// be skipped.
    pub fn specific_mode(&self) -> bool {
        self.ta2.is_some()
    }

    /// IFSC announced by the first T=1 TA byte, if any
    pub fn ifsc_hint(&self) -> Option<u8> {
        self.t1_ib(0)
    }

    /// CRC is selected by bit 0 of the first T=1 TC byte
    pub fn crc_requested(&self) -> bool {
        self.t1_ib(2).is_some_and(|tc| tc & 0x01 != 0)
    }
}
