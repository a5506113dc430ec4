#[path = "../common/mod.rs"]
mod common;

use std::cell::RefCell;
use std::rc::Rc;

use t1link::prelude::*;

use common::fixtures;
use common::helpers::ScriptedCard;

#[test]
fn end_to_end_select_and_read() {
    let (card, script) = ScriptedCard::new();
    script.respond_with(vec![0x6F, 0x0A, 0x90, 0x00]);
    script.respond_with(vec![0x01, 0x02, 0x03, 0x90, 0x00]);

    let mut reader = Reader::new(Box::new(card));
    let mut conn = reader.connect().unwrap();
    conn.establish().unwrap();

    assert_eq!(
        conn.transmit(&fixtures::select_apdu()).unwrap(),
        vec![0x6F, 0x0A, 0x90, 0x00]
    );
    assert_eq!(
        conn.transmit(&[0x00, 0xB0, 0x00, 0x00]).unwrap(),
        vec![0x01, 0x02, 0x03, 0x90, 0x00]
    );
    conn.disconnect().unwrap();
}

#[test]
fn chained_command_end_to_end() {
    let (card, script) = ScriptedCard::new();
    let mut reader = Reader::new(Box::new(card));
    let mut conn = reader.connect().unwrap();
    conn.establish().unwrap();
    conn.set_param(Param::Ifsc, ParamValue::Value(16)).unwrap();

    // 50 bytes forces a four-block chain on the wire
    let resp = conn.transmit(&[0x42; 50]).unwrap();
    assert_eq!(resp, fixtures::status_ok());

    // chained I-blocks plus the final one all went out
    let sent = script.sent.borrow();
    let iblocks = sent
        .iter()
        .filter(|f| {
            f.first() == Some(&0x00)
                && matches!(
                    Block::decode(f, ChecksumKind::Lrc),
                    Ok(Block::Info { .. })
                )
        })
        .count();
    assert_eq!(iblocks, 4);
}

#[test]
fn card_removal_and_recovery() {
    let (card, script) = ScriptedCard::new();
    let mut reader = Reader::new(Box::new(card));
    let mut conn = reader.connect().unwrap();
    conn.establish().unwrap();

    script.present.set(false);
    conn.pump(50).unwrap();
    assert_eq!(conn.state(), EngineState::Error);
    assert!(conn.transmit(&fixtures::select_apdu()).is_err());

    // card re-inserted: skip the ATR wait, renegotiate, carry on
    script.present.set(true);
    conn.reset(true).unwrap();
    assert_eq!(conn.state(), EngineState::Idle);
    assert_eq!(
        conn.transmit(&fixtures::select_apdu()).unwrap(),
        fixtures::status_ok()
    );
}

#[test]
fn observer_stream_over_a_session() {
    struct Recorder(Rc<RefCell<Vec<&'static str>>>);
    impl LinkObserver for Recorder {
        fn on_event(&mut self, event: &Event) {
            self.0.borrow_mut().push(match event {
                Event::AtrReceived(_) => "atr",
                Event::Connected => "connected",
                Event::ApduReceived(_) => "apdu",
                Event::Error(_) => "error",
            });
        }
    }

    let log = Rc::new(RefCell::new(Vec::new()));
    let (card, script) = ScriptedCard::new();
    let mut reader = Reader::new(Box::new(card));
    let mut conn = reader.connect().unwrap();
    conn.observe(Box::new(Recorder(Rc::clone(&log))));

    conn.establish().unwrap();
    conn.transmit(&fixtures::select_apdu()).unwrap();
    script.present.set(false);
    conn.pump(50).unwrap();

    assert_eq!(*log.borrow(), vec!["atr", "connected", "apdu", "error"]);
}

#[test]
fn second_session_after_disconnect() {
    let (card, _script) = ScriptedCard::new();
    let mut reader = Reader::new(Box::new(card));

    {
        let mut conn = reader.connect().unwrap();
        conn.establish().unwrap();
        conn.transmit(&fixtures::select_apdu()).unwrap();
    } // dropped: transport deactivated

    let mut conn = reader.connect().unwrap();
    conn.establish().unwrap();
    assert_eq!(
        conn.transmit(&fixtures::select_apdu()).unwrap(),
        fixtures::status_ok()
    );
}
