// t1link/src/protocol/block.rs
//! T=1 block codec.
//!
//! A block is a 3-byte prologue (NAD, PCB, LEN), an information field of
//! 0-254 bytes and a 1- or 2-byte error detection trailer. The PCB top two
//! bits select the kind; the kind-specific flags are built and parsed with
//! explicit mask/shift helpers rather than bit-field layout tricks.

use crate::constants::{MAX_INF_LEN, NAD, PROLOGUE_LEN};
use crate::protocol::checksum;
use crate::types::ChecksumKind;
use crate::{Error, Result};

const PCB_I_SEQ: u8 = 0x40;
const PCB_I_MORE: u8 = 0x20;
const PCB_R_MASK: u8 = 0xC0;
const PCB_R_VALUE: u8 = 0x80;
const PCB_R_SEQ: u8 = 0x10;
const PCB_R_ACK_MASK: u8 = 0x0F;
const PCB_S_MASK: u8 = 0xC0;
const PCB_S_VALUE: u8 = 0xC0;
const PCB_S_RESPONSE: u8 = 0x20;
const PCB_S_CMD_MASK: u8 = 0x1F;

/// Receive-ready acknowledgement codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RAck {
    /// Expected block received intact
    Ok = 0,
    /// Trailer verification failed on the card side
    CrcError = 1,
    /// Any other receive error on the card side
    OtherError = 2,
}

/// Supervisory commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SCommand {
    /// Resynchronize sequence numbers
    Resync = 0,
    /// Change the information field size
    Ifs = 1,
    /// Abort the current chain
    Abort = 2,
    /// Wait time extension
    Wtx = 3,
}

/// One T=1 block, discriminated by kind. The payload travels with the
/// variant, so callers never have to know which union arm is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Information block carrying (part of) an APDU
    Info {
        /// Chained: another I-block follows
        more: bool,
        /// Send sequence bit N(S)
        seq: bool,
        /// Information field
        payload: Vec<u8>,
    },
    /// Acknowledgement / negative acknowledgement
    ReceiveReady {
        /// Ack code
        ack: RAck,
        /// Expected next sequence bit N(R)
        seq: bool,
    },
    /// Control negotiation
    Supervisory {
        /// Command
        cmd: SCommand,
        /// True for the response half of the exchange
        response: bool,
        /// One-byte parameter for Ifs and Wtx
        param: Option<u8>,
    },
}

/// PCB for an information block
pub fn info_pcb(more: bool, seq: bool) -> u8 {
    let mut pcb = 0u8;
    if seq {
        pcb |= PCB_I_SEQ;
    }
    if more {
        pcb |= PCB_I_MORE;
    }
    pcb
}

/// PCB for a receive-ready block
pub fn rr_pcb(ack: RAck, seq: bool) -> u8 {
    let mut pcb = PCB_R_VALUE | (ack as u8 & PCB_R_ACK_MASK);
    if seq {
        pcb |= PCB_R_SEQ;
    }
    pcb
}

/// PCB for a supervisory block
pub fn s_pcb(cmd: SCommand, response: bool) -> u8 {
    let mut pcb = PCB_S_VALUE | (cmd as u8 & PCB_S_CMD_MASK);
    if response {
        pcb |= PCB_S_RESPONSE;
    }
    pcb
}

/// Rebuild a block from its PCB and information field.
pub fn from_wire(pcb: u8, inf: &[u8]) -> Result<Block> {
    if pcb & 0x80 == 0 {
        return Ok(Block::Info {
            more: pcb & PCB_I_MORE != 0,
            seq: pcb & PCB_I_SEQ != 0,
            payload: inf.to_vec(),
        });
    }
    if pcb & PCB_R_MASK == PCB_R_VALUE {
        let ack = match pcb & PCB_R_ACK_MASK {
            0 => RAck::Ok,
            1 => RAck::CrcError,
            2 => RAck::OtherError,
            _ => return Err(Error::UnrecognizedBlock { pcb }),
        };
        if !inf.is_empty() {
            return Err(Error::InvalidBlockLength(inf.len()));
        }
        return Ok(Block::ReceiveReady {
            ack,
            seq: pcb & PCB_R_SEQ != 0,
        });
    }
    debug_assert_eq!(pcb & PCB_S_MASK, PCB_S_VALUE);
    let cmd = match pcb & PCB_S_CMD_MASK {
        0 => SCommand::Resync,
        1 => SCommand::Ifs,
        2 => SCommand::Abort,
        3 => SCommand::Wtx,
        _ => return Err(Error::UnrecognizedBlock { pcb }),
    };
    let param = match (cmd, inf.len()) {
        (SCommand::Resync | SCommand::Abort, 0) => None,
        (SCommand::Ifs | SCommand::Wtx, 1) => Some(inf[0]),
        _ => return Err(Error::InvalidBlockLength(inf.len())),
    };
    Ok(Block::Supervisory {
        cmd,
        response: pcb & PCB_S_RESPONSE != 0,
        param,
    })
}

impl Block {
    fn pcb(&self) -> u8 {
        match self {
            Block::Info { more, seq, .. } => info_pcb(*more, *seq),
            Block::ReceiveReady { ack, seq } => rr_pcb(*ack, *seq),
            Block::Supervisory { cmd, response, .. } => s_pcb(*cmd, *response),
        }
    }

    fn inf(&self) -> &[u8] {
        match self {
            Block::Info { payload, .. } => payload,
            Block::ReceiveReady { .. } => &[],
            Block::Supervisory { param, .. } => match param {
                Some(p) => std::slice::from_ref(p),
                None => &[],
            },
        }
    }

    /// Encode into a complete wire frame with the selected trailer.
    pub fn encode(&self, kind: ChecksumKind) -> Result<Vec<u8>> {
        let inf = self.inf();
        if inf.len() > MAX_INF_LEN {
            return Err(Error::InvalidBlockLength(inf.len()));
        }

        let prologue = [NAD, self.pcb(), inf.len() as u8];
        let mut out = Vec::with_capacity(PROLOGUE_LEN + inf.len() + kind.len());
        out.extend_from_slice(&prologue);
        out.extend_from_slice(inf);

        let mut trailer = [0u8; 2];
        let n = checksum::compute(kind, &[&prologue, inf], &mut trailer);
        out.extend_from_slice(&trailer[..n]);
        Ok(out)
    }

    /// Decode a complete wire frame, verifying NAD, LEN and the trailer.
    pub fn decode(raw: &[u8], kind: ChecksumKind) -> Result<Block> {
        if raw.len() < PROLOGUE_LEN + kind.len() {
            return Err(Error::InvalidBlockLength(raw.len()));
        }
        if raw[0] != NAD {
            return Err(Error::UnrecognizedBlock { pcb: raw[1] });
        }
        let len = usize::from(raw[2]);
        if len > MAX_INF_LEN {
            return Err(Error::InvalidBlockLength(len));
        }
        if raw.len() != PROLOGUE_LEN + len + kind.len() {
            return Err(Error::InvalidBlockLength(raw.len()));
        }

        let inf = &raw[PROLOGUE_LEN..PROLOGUE_LEN + len];
        let trailer = &raw[PROLOGUE_LEN + len..];
        if !checksum::verify(kind, &[&raw[..PROLOGUE_LEN], inf], trailer) {
            let segments: [&[u8]; 2] = [&raw[..PROLOGUE_LEN], inf];
            let (expected, actual) = match kind {
                ChecksumKind::Lrc => (
                    u16::from(checksum::lrc(&segments)),
                    u16::from(trailer[0]),
                ),
                ChecksumKind::Crc16 => (
                    checksum::crc16(&segments),
                    u16::from_le_bytes([trailer[0], trailer[1]]),
                ),
            };
            return Err(Error::ChecksumMismatch { expected, actual });
        }

        from_wire(raw[1], inf)
    }
}
