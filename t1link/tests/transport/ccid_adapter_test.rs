#[path = "../common/mod.rs"]
mod common;

use std::collections::VecDeque;

use t1link::constants::{
    CCID_PC_TO_RDR_GET_SLOT_STATUS, CCID_PC_TO_RDR_ICC_POWER_OFF, CCID_PC_TO_RDR_ICC_POWER_ON,
    CCID_PC_TO_RDR_XFR_BLOCK, CCID_RDR_TO_PC_DATA_BLOCK, CCID_RDR_TO_PC_SLOT_STATUS,
};
use t1link::prelude::*;

use common::fixtures;

/// A bulk pipe with a T=1 card behind it: every command is answered the
/// way a real reader with an inserted card would.
struct CardBehindPipe {
    responses: VecDeque<Vec<u8>>,
    seq: bool,
    features: u32,
}

impl CardBehindPipe {
    fn new() -> Self {
        Self {
            responses: VecDeque::new(),
            seq: false,
            features: 0,
        }
    }

    fn reply(&mut self, msg_type: u8, ccid_seq: u8, payload: &[u8]) {
        let mut frame = vec![msg_type];
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.push(0);
        frame.push(ccid_seq);
        frame.extend_from_slice(&[0, 0, 0]);
        frame.extend_from_slice(payload);
        self.responses.push_back(frame);
    }

    /// T=1 card behavior for one received frame.
    fn card_answer(&mut self, frame: &[u8]) -> Vec<u8> {
        if frame.first() == Some(&0xFF) {
            return frame.to_vec();
        }
        match Block::decode(frame, ChecksumKind::Lrc) {
            Ok(Block::Supervisory {
                cmd: SCommand::Ifs,
                response: false,
                param,
            }) => fixtures::sblock(SCommand::Ifs, true, param),
            Ok(Block::Info { more: true, seq, .. }) => fixtures::rr(RAck::Ok, !seq),
            Ok(Block::Info { more: false, .. }) => {
                let frame = fixtures::iblock(false, self.seq, &fixtures::status_ok());
                self.seq = !self.seq;
                frame
            }
            _ => Vec::new(),
        }
    }
}

impl BulkPipe for CardBehindPipe {
    fn bulk_out(&mut self, bytes: &[u8]) -> Result<()> {
        let ccid_seq = bytes[6];
        match bytes[0] {
            CCID_PC_TO_RDR_ICC_POWER_ON => {
                self.seq = false;
                let atr = fixtures::atr_t1();
                self.reply(CCID_RDR_TO_PC_DATA_BLOCK, ccid_seq, &atr);
            }
            CCID_PC_TO_RDR_ICC_POWER_OFF | CCID_PC_TO_RDR_GET_SLOT_STATUS => {
                self.reply(CCID_RDR_TO_PC_SLOT_STATUS, ccid_seq, &[]);
            }
            CCID_PC_TO_RDR_XFR_BLOCK => {
                let answer = self.card_answer(&bytes[10..]);
                self.reply(CCID_RDR_TO_PC_DATA_BLOCK, ccid_seq, &answer);
            }
            other => panic!("unexpected ccid command {:#04x}", other),
        }
        Ok(())
    }

    fn bulk_in(&mut self, _timeout_ms: u32) -> Result<Vec<u8>> {
        self.responses.pop_front().ok_or(Error::Timeout)
    }

    fn features(&self) -> u32 {
        self.features
    }
}

#[test]
fn full_session_over_ccid() {
    let transport = CcidTransport::new(CardBehindPipe::new());
    let mut reader = Reader::new(Box::new(transport));

    let mut conn = reader.connect().unwrap();
    conn.establish().unwrap();
    assert!(conn.atr().is_some());

    let resp = conn.transmit(&fixtures::select_apdu()).unwrap();
    assert_eq!(resp, fixtures::status_ok());

    let resp = conn.transmit(&[0x00, 0xB0, 0x00, 0x00]).unwrap();
    assert_eq!(resp, fixtures::status_ok());
    conn.disconnect().unwrap();
}

#[test]
fn ccid_presence_via_slot_status() {
    let mut t = CcidTransport::new(CardBehindPipe::new());
    // status byte 0: card present and active
    assert!(t.card_present());
}

#[test]
fn empty_xfr_response_keeps_stream_empty() {
    let mut t = CcidTransport::new(CardBehindPipe::new());
    // garbage that decodes to nothing yields an empty data block
    t.send(&[0x55, 0x55]).unwrap();
    assert!(t.poll().unwrap().is_empty());
}
