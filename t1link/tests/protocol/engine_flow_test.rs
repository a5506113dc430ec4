#[path = "../common/mod.rs"]
mod common;

use t1link::prelude::*;

use common::{fixtures, helpers};
use helpers::RecordingSink;

#[test]
fn handshake_applies_atr_hints() {
    let mut engine = Engine::new(Config::default());
    let mut sink = RecordingSink::default();

    engine.start();
    engine.feed(&fixtures::atr_t1_with_group(0x10, 0x01), &mut sink);
    engine.tick(60, &mut sink);
    engine.tick(60, &mut sink);

    // IFSC and checksum follow the card's interface bytes
    assert_eq!(engine.config().get(Param::Ifsc), 0x10);
    assert_eq!(engine.config().checksum(), ChecksumKind::Crc16);
    assert_eq!(engine.state(), EngineState::PpsExchange);

    engine.feed(&fixtures::pps_t1(), &mut sink);
    // the IFSD request already carries the CRC trailer
    let ifsd = sink.frames.last().unwrap().clone();
    assert_eq!(
        Block::decode(&ifsd, ChecksumKind::Crc16).unwrap(),
        Block::Supervisory {
            cmd: SCommand::Ifs,
            response: false,
            param: Some(254),
        }
    );

    let reply = Block::Supervisory {
        cmd: SCommand::Ifs,
        response: true,
        param: Some(254),
    }
    .encode(ChecksumKind::Crc16)
    .unwrap();
    let events = engine.feed(&reply, &mut sink);
    assert!(matches!(events[..], [Event::Connected]));
}

#[test]
fn consecutive_exchanges_share_one_session() {
    let (mut engine, mut sink) = helpers::connected_engine();

    let commands: [&[u8]; 3] = [&[0x00, 0xA4, 0x04, 0x00], &[0x00, 0xB0, 0x00, 0x00], &[0x80, 0xCA, 0x9F, 0x17]];
    let mut card_seq = false;
    for command in commands {
        engine.submit(command, &mut sink).unwrap();
        let events = engine.feed(
            &fixtures::iblock(false, card_seq, &fixtures::status_ok()),
            &mut sink,
        );
        assert!(matches!(events[..], [Event::ApduReceived(_)]));
        card_seq = !card_seq;
    }
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn chain_both_directions() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine.set_param(Param::Ifsc, ParamValue::Value(4)).unwrap();

    // host chains a 10-byte command into three blocks
    engine.submit(&[0xAB; 10], &mut sink).unwrap();
    let mut acked = 0;
    while acked < 2 {
        let sent = sink.frames.last().unwrap().clone();
        let Block::Info { seq, more: true, .. } = Block::decode(&sent, ChecksumKind::Lrc).unwrap()
        else {
            panic!("expected a chained I-block");
        };
        engine.feed(&fixtures::rr(RAck::Ok, !seq), &mut sink);
        acked += 1;
    }

    // card chains its response in two blocks
    let events = engine.feed(&fixtures::iblock(true, false, &[0x11; 4]), &mut sink);
    assert!(events.is_empty());
    let events = engine.feed(
        &fixtures::iblock(false, true, &fixtures::status_ok()),
        &mut sink,
    );
    match &events[..] {
        [Event::ApduReceived(apdu)] => {
            assert_eq!(apdu.len(), 6);
            assert_eq!(&apdu[4..], &fixtures::status_ok()[..]);
        }
        other => panic!("expected ApduReceived, got: {:?}", other),
    }
}

#[test]
fn wtx_exchange_midstream() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine.submit(&fixtures::select_apdu(), &mut sink).unwrap();

    engine.feed(&fixtures::sblock(SCommand::Wtx, false, Some(5)), &mut sink);
    let reply = sink.frames.last().unwrap().clone();
    assert_eq!(
        Block::decode(&reply, ChecksumKind::Lrc).unwrap(),
        Block::Supervisory {
            cmd: SCommand::Wtx,
            response: true,
            param: Some(5),
        }
    );

    // exchange still completes normally afterwards
    let events = engine.feed(
        &fixtures::iblock(false, false, &fixtures::status_ok()),
        &mut sink,
    );
    assert!(matches!(events[..], [Event::ApduReceived(_)]));
}

#[test]
fn blocks_sent_counter_increases() {
    let (mut engine, mut sink) = helpers::connected_engine();
    let before = engine.blocks_sent();
    engine.submit(&fixtures::select_apdu(), &mut sink).unwrap();
    assert_eq!(engine.blocks_sent(), before + 1);
}
