#[path = "../common/mod.rs"]
mod common;

use t1link::prelude::*;
use t1link::protocol::decoder::BlockDecoder;

use common::fixtures;

#[test]
fn iblock_wire_format_matches_reference() {
    // NAD 00, PCB 00 (seq 0, no chain), LEN 04, APDU, LRC
    let raw = fixtures::iblock(false, false, &fixtures::select_apdu());
    assert_eq!(hex::encode(&raw), "00000400a40400a4");
}

#[test]
fn rr_wire_format_matches_reference() {
    let raw = fixtures::rr(RAck::CrcError, true);
    assert_eq!(hex::encode(&raw), "00910091");
}

#[test]
fn resync_request_wire_format() {
    let raw = fixtures::sblock(SCommand::Resync, false, None);
    assert_eq!(hex::encode(&raw), "00c000c0");
}

#[test]
fn crc_frames_roundtrip() {
    let block = Block::Info {
        more: true,
        seq: true,
        payload: vec![0xDE, 0xAD, 0xBE, 0xEF],
    };
    let raw = block.encode(ChecksumKind::Crc16).unwrap();
    // two-byte little-endian trailer
    assert_eq!(raw.len(), 3 + 4 + 2);
    assert_eq!(Block::decode(&raw, ChecksumKind::Crc16).unwrap(), block);
}

#[test]
fn decoder_consumes_a_session_worth_of_frames() {
    let mut wire = Vec::new();
    wire.extend(fixtures::iblock(true, false, &[0x01, 0x02]));
    wire.extend(fixtures::rr(RAck::Ok, true));
    wire.extend(fixtures::sblock(SCommand::Wtx, false, Some(3)));
    wire.extend(fixtures::iblock(false, true, &fixtures::status_ok()));

    let mut dec = BlockDecoder::new(ChecksumKind::Lrc);
    let blocks: Vec<Block> = wire
        .iter()
        .filter_map(|&b| dec.push(b))
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(blocks.len(), 4);
    assert!(matches!(blocks[0], Block::Info { more: true, .. }));
    assert!(matches!(blocks[1], Block::ReceiveReady { ack: RAck::Ok, .. }));
    assert!(matches!(
        blocks[2],
        Block::Supervisory {
            cmd: SCommand::Wtx,
            response: false,
            param: Some(3),
        }
    ));
    assert!(matches!(blocks[3], Block::Info { more: false, .. }));
}

#[test]
fn decoder_survives_interleaved_noise() {
    let mut wire = vec![0xAA, 0x55]; // line noise before the NAD
    wire.extend(fixtures::rr(RAck::Ok, false));

    let mut dec = BlockDecoder::new(ChecksumKind::Lrc);
    let blocks: Vec<_> = wire.iter().filter_map(|&b| dec.push(b)).collect();
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].is_ok());
}
