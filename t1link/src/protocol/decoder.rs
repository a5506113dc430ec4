// t1link/src/protocol/decoder.rs
//! Byte-driven block framer.
//!
//! Wire bytes arrive in arbitrary chunk sizes, so framing runs as an
//! explicit sub-state machine that is re-entrant across calls:
//! skip-leading-garbage -> address -> control -> length -> payload ->
//! trailer. The engine aborts a partially received block by calling
//! [`BlockDecoder::reset`] when the inter-byte timer fires.

use crate::constants::{MAX_INF_LEN, NAD};
use crate::protocol::block::{self, Block};
use crate::protocol::checksum;
use crate::types::ChecksumKind;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Discard bytes until the node address shows up
    Address,
    Control,
    Length,
    Payload,
    Trailer,
}

/// Re-entrant T=1 block decoder
#[derive(Debug)]
pub struct BlockDecoder {
    kind: ChecksumKind,
    phase: Phase,
    pcb: u8,
    len: usize,
    payload: Vec<u8>,
    trailer: Vec<u8>,
}

impl BlockDecoder {
    /// New decoder for the given trailer kind
    pub fn new(kind: ChecksumKind) -> Self {
        Self {
            kind,
            phase: Phase::Address,
            pcb: 0,
            len: 0,
            payload: Vec::new(),
            trailer: Vec::new(),
        }
    }

    /// Change the trailer kind (after configuration updates). Drops any
    /// partial block.
    pub fn set_kind(&mut self, kind: ChecksumKind) {
        self.kind = kind;
        self.reset();
    }

    /// Drop any partially accumulated block
    pub fn reset(&mut self) {
        self.phase = Phase::Address;
        self.payload.clear();
        self.trailer.clear();
    }

    /// True while a block is partially accumulated (inter-byte timeout
    /// applies only then)
    pub fn in_progress(&self) -> bool {
        self.phase != Phase::Address
    }

    /// Feed one wire byte. Returns a decoded block or a framing error once
    /// a full frame has been accumulated, None while more bytes are needed.
    pub fn push(&mut self, byte: u8) -> Option<Result<Block>> {
        match self.phase {
            Phase::Address => {
                // leading garbage is skipped byte by byte
                if byte == NAD {
                    self.phase = Phase::Control;
                }
                None
            }
            Phase::Control => {
                self.pcb = byte;
                self.phase = Phase::Length;
                None
            }
            Phase::Length => {
                let len = usize::from(byte);
                if len > MAX_INF_LEN {
                    self.reset();
                    return Some(Err(Error::InvalidBlockLength(len)));
                }
                self.len = len;
                self.phase = if len == 0 { Phase::Trailer } else { Phase::Payload };
                None
            }
            Phase::Payload => {
                self.payload.push(byte);
                if self.payload.len() == self.len {
                    self.phase = Phase::Trailer;
                }
                None
            }
            Phase::Trailer => {
                self.trailer.push(byte);
                if self.trailer.len() < self.kind.len() {
                    return None;
                }
                Some(self.finish())
            }
        }
    }

    fn finish(&mut self) -> Result<Block> {
        let prologue = [NAD, self.pcb, self.len as u8];
        let segments: [&[u8]; 2] = [&prologue, &self.payload];
        let ok = checksum::verify(self.kind, &segments, &self.trailer);

        let result = if ok {
            block::from_wire(self.pcb, &self.payload)
        } else {
            let (expected, actual) = match self.kind {
                ChecksumKind::Lrc => (
                    u16::from(checksum::lrc(&segments)),
                    u16::from(self.trailer[0]),
                ),
                ChecksumKind::Crc16 => (
                    checksum::crc16(&segments),
                    u16::from_le_bytes([self.trailer[0], self.trailer[1]]),
                ),
            };
            Err(Error::ChecksumMismatch { expected, actual })
        };

        self.reset();
        result
    }
}
