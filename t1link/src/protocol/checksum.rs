// t1link/src/protocol/checksum.rs
//! Error detection codes for T=1 blocks: LRC (one-byte XOR) and CRC-16
//! (ISO/IEC 3309 polynomial, table-driven, initial value 0xFFFF,
//! little-endian trailer).
//!
//! Both operate over a list of disjoint byte segments so the prologue and
//! the payload do not have to be contiguous in memory.

use crate::types::ChecksumKind;

/// Running XOR over all segment bytes
pub fn lrc(segments: &[&[u8]]) -> u8 {
    let mut c = 0u8;
    for seg in segments {
        for &b in *seg {
            c ^= b;
        }
    }
    c
}

const fn build_crc16_table() -> [u16; 256] {
    // Reflected form of the ISO/IEC 3309 polynomial x^16 + x^12 + x^5 + 1
    const POLY: u16 = 0x8408;
    let mut table = [0u16; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const CRC16_TABLE: [u16; 256] = build_crc16_table();

/// CRC-16 over all segment bytes
pub fn crc16(segments: &[&[u8]]) -> u16 {
    let mut crc = 0xFFFFu16;
    for seg in segments {
        for &b in *seg {
            let idx = ((crc ^ u16::from(b)) & 0xFF) as usize;
            crc = (crc >> 8) ^ CRC16_TABLE[idx];
        }
    }
    crc
}

/// Compute the selected code over `segments` and write the trailer into
/// `out`. Returns the number of bytes written (1 for LRC, 2 for CRC-16) or
/// 0 when `out` is too small.
pub fn compute(kind: ChecksumKind, segments: &[&[u8]], out: &mut [u8]) -> usize {
    match kind {
        ChecksumKind::Lrc => {
            if out.is_empty() {
                return 0;
            }
            out[0] = lrc(segments);
            1
        }
        ChecksumKind::Crc16 => {
            if out.len() < 2 {
                return 0;
            }
            out[..2].copy_from_slice(&crc16(segments).to_le_bytes());
            2
        }
    }
}

/// Verify a received trailer against the selected code
pub fn verify(kind: ChecksumKind, segments: &[&[u8]], trailer: &[u8]) -> bool {
    let mut expected = [0u8; 2];
    let n = compute(kind, segments, &mut expected);
    n == trailer.len() && expected[..n] == trailer[..n]
}
