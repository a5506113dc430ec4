#[path = "../common/mod.rs"]
mod common;

use t1link::prelude::*;

use common::{fixtures, helpers};
use helpers::RecordingSink;

/// Let the armed response window expire (two nonzero ticks).
fn expire_response_window(engine: &mut Engine, sink: &mut RecordingSink) {
    engine.tick(200, sink);
    engine.tick(150, sink);
}

#[test]
fn timeout_ladder_escalates_to_resync() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine.submit(&fixtures::select_apdu(), &mut sink).unwrap();

    // nine timeouts prompt the card with R-blocks
    for _ in 0..9 {
        expire_response_window(&mut engine, &mut sink);
        assert_ne!(engine.state(), EngineState::Resynchronizing);
    }
    // the tenth exhausts the delivery budget
    expire_response_window(&mut engine, &mut sink);
    assert_eq!(engine.state(), EngineState::Resynchronizing);

    let last = sink.frames.last().unwrap().clone();
    assert_eq!(
        Block::decode(&last, ChecksumKind::Lrc).unwrap(),
        Block::Supervisory {
            cmd: SCommand::Resync,
            response: false,
            param: None,
        }
    );
}

#[test]
fn resync_timeouts_end_the_session() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine.submit(&fixtures::select_apdu(), &mut sink).unwrap();
    for _ in 0..10 {
        expire_response_window(&mut engine, &mut sink);
    }
    assert_eq!(engine.state(), EngineState::Resynchronizing);

    expire_response_window(&mut engine, &mut sink);
    expire_response_window(&mut engine, &mut sink);
    let mut events = Vec::new();
    events.extend(engine.tick(200, &mut sink));
    events.extend(engine.tick(150, &mut sink));
    assert!(matches!(events[..], [Event::Error(Error::CommFailure)]));
    assert_eq!(engine.state(), EngineState::Error);
}

#[test]
fn oversized_response_rejected() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine
        .set_param(Param::MaxApduLen, ParamValue::Value(254))
        .unwrap();

    engine.feed(&fixtures::iblock(true, false, &[0x00; 200]), &mut sink);
    let events = engine.feed(&fixtures::iblock(false, true, &[0x00; 200]), &mut sink);
    assert!(matches!(
        events[..],
        [Event::Error(Error::OversizedApdu { max: 254 })]
    ));
    assert_eq!(engine.state(), EngineState::Error);
}

#[test]
fn stale_ack_retransmits_instead_of_advancing() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine.set_param(Param::Ifsc, ParamValue::Value(4)).unwrap();
    engine.submit(&[0x55; 8], &mut sink).unwrap();
    let first = sink.frames.last().unwrap().clone();

    // the ack names the sequence just sent, not the next expected one
    let events = engine.feed(&fixtures::rr(RAck::Ok, false), &mut sink);
    assert!(events.is_empty());
    assert_eq!(engine.state(), EngineState::WaitingForResponse);
    assert_eq!(sink.frames.len(), 2);
    assert_eq!(sink.frames.last().unwrap(), &first);

    // a correctly numbered ack then advances the chain
    engine.feed(&fixtures::rr(RAck::Ok, true), &mut sink);
    assert!(matches!(
        Block::decode(sink.frames.last().unwrap(), ChecksumKind::Lrc).unwrap(),
        Block::Info {
            more: false,
            seq: true,
            ..
        }
    ));
}

#[test]
fn abort_mid_chain() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine.set_param(Param::Ifsc, ParamValue::Value(4)).unwrap();
    engine.submit(&[0x77; 12], &mut sink).unwrap();
    engine.feed(&fixtures::rr(RAck::Ok, true), &mut sink);

    let events = engine.feed(&fixtures::sblock(SCommand::Abort, false, None), &mut sink);
    assert!(matches!(events[..], [Event::Error(Error::Aborted)]));
    assert_eq!(engine.state(), EngineState::Error);
}

#[test]
fn ifsd_negotiation_gives_up() {
    let mut engine = Engine::new(Config::default());
    let mut sink = RecordingSink::default();
    engine.start();
    engine.feed(&fixtures::atr_t1(), &mut sink);
    engine.tick(60, &mut sink);
    engine.tick(60, &mut sink);
    engine.feed(&fixtures::pps_t1(), &mut sink);
    assert_eq!(engine.state(), EngineState::IfsdSetup);

    // a card that keeps answering garbage exhausts the attempt budget
    let mut garbage = fixtures::sblock(SCommand::Ifs, true, Some(254));
    *garbage.last_mut().unwrap() ^= 0xFF;
    let mut events = Vec::new();
    for _ in 0..10 {
        events.extend(engine.feed(&garbage, &mut sink));
    }
    assert!(matches!(events[..], [Event::Error(Error::IfsdFailed)]));
}

#[test]
fn invalid_pps_response_is_fatal() {
    let mut engine = Engine::new(Config::default());
    let mut sink = RecordingSink::default();
    engine.start();
    engine.feed(&fixtures::atr_t1(), &mut sink);
    engine.tick(60, &mut sink);
    engine.tick(60, &mut sink);
    assert_eq!(engine.state(), EngineState::PpsExchange);

    // response names T=0 instead of the requested protocol
    let events = engine.feed(&[0xFF, 0x00, 0xFF], &mut sink);
    assert!(matches!(events[..], [Event::Error(Error::PpsFailed)]));
}

#[test]
fn inter_byte_timeout_drops_partial_frame() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine.submit(&fixtures::select_apdu(), &mut sink).unwrap();

    // half a frame, then silence
    let frame = fixtures::iblock(false, false, &fixtures::status_ok());
    engine.feed(&frame[..3], &mut sink);
    engine.tick(60, &mut sink);
    let events = engine.tick(60, &mut sink);
    assert!(events.is_empty());

    // the engine asked for a repeat; a clean frame then completes
    let rr = sink.frames.last().unwrap().clone();
    assert!(matches!(
        Block::decode(&rr, ChecksumKind::Lrc).unwrap(),
        Block::ReceiveReady { .. }
    ));
    let events = engine.feed(&frame, &mut sink);
    assert!(matches!(events[..], [Event::ApduReceived(_)]));
}

#[test]
fn recovery_via_reset_after_fatal() {
    let (mut engine, mut sink) = helpers::connected_engine();
    engine.feed(&fixtures::sblock(SCommand::Abort, false, None), &mut sink);
    assert_eq!(engine.state(), EngineState::Error);

    // skip the ATR wait: parameters are cached from the first session
    engine.reset(true, &mut sink);
    assert_eq!(engine.state(), EngineState::PpsExchange);
    engine.feed(&fixtures::pps_t1(), &mut sink);
    let events = engine.feed(&fixtures::sblock(SCommand::Ifs, true, Some(254)), &mut sink);
    assert!(matches!(events[..], [Event::Connected]));
}
