// t1link/src/protocol/engine.rs
//! The T=1 protocol state machine.
//!
//! The engine performs no I/O of its own: hosts push received wire bytes
//! into [`Engine::feed`], report elapsed time through [`Engine::tick`] and
//! queue outbound APDUs with [`Engine::submit`]. Outgoing bytes leave
//! through the [`ByteSink`] passed into each entry point, and every entry
//! point returns the list of events that completed during the call, so an
//! event handler can safely call straight back into the engine.

use log::{debug, trace, warn};

use crate::config::{Config, Param, ParamValue};
use crate::constants::{
    MAX_BLOCK_ATTEMPTS, MAX_RESYNC_ATTEMPTS, MAX_WRITE_ATTEMPTS, PPSS,
};
use crate::protocol::atr::Atr;
use crate::protocol::block::{Block, RAck, SCommand};
use crate::protocol::decoder::BlockDecoder;
use crate::protocol::fifo::Fifo;
use crate::protocol::timer::Countdown;
use crate::utils::bytes_to_hex_spaced;
use crate::{Error, Result};

/// Transmit queue backing size. A chain that does not fit here is rejected
/// before anything is enqueued.
const TX_FIFO_CAPACITY: usize = 4096;

/// Maximum raw ATR length the accumulator accepts
const ATR_ACCUMULATOR_MAX: usize = crate::constants::ATR_MAX_LEN;

/// Byte sink the engine transmits through. `false` signals a
/// transport-level I/O failure; the engine retries a bounded number of
/// times before giving up on the link.
pub trait ByteSink {
    /// Transmit raw bytes on the wire
    fn write(&mut self, bytes: &[u8]) -> bool;
}

/// Engine lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Card was activated, ATR bytes are being accumulated
    WaitingForAtr,
    /// PPS request sent, response pending
    PpsExchange,
    /// S(IFS) request sent to fix the device information field size
    IfsdSetup,
    /// Connected, nothing in flight
    Idle,
    /// One or more queued blocks being delivered or a reply pending
    WaitingForResponse,
    /// Error recovery via S(RESYNCH)
    Resynchronizing,
    /// Terminal until the host calls [`Engine::reset`]
    Error,
}

/// Events surfaced to the host. Payloads are owned values; they stay valid
/// for as long as the host keeps them.
#[derive(Debug)]
pub enum Event {
    /// ATR decoded successfully
    AtrReceived(Atr),
    /// Negotiation finished, APDUs can be exchanged
    Connected,
    /// A complete response APDU was reassembled
    ApduReceived(Vec<u8>),
    /// Fatal condition; the engine is now in [`EngineState::Error`]
    Error(Error),
}

/// Parameters of the most recently transmitted block, kept so it can be
/// retransmitted without re-encoding.
#[derive(Debug, Clone)]
struct LastSent {
    raw: Vec<u8>,
}

/// T=1 protocol engine
pub struct Engine {
    cfg: Config,
    state: EngineState,
    fifo: Fifo,
    decoder: BlockDecoder,

    seq_tx: bool,
    seq_rx: bool,
    attempts_left: u8,
    resync_left: u8,
    last_sent: Option<LastSent>,
    blocks_sent: u32,

    atr_buf: Vec<u8>,
    atr: Option<Atr>,
    pps_buf: Vec<u8>,
    rx_apdu: Vec<u8>,
    awaiting_reply: bool,
    extended_bwt: Option<u32>,

    inter_byte: Countdown,
    atr_timer: Countdown,
    response: Countdown,

    events: Vec<Event>,
}

impl Engine {
    /// New engine with the given configuration. The engine stays inert
    /// until [`Engine::start`] is called after card activation.
    pub fn new(cfg: Config) -> Self {
        let kind = cfg.checksum();
        Self {
            cfg,
            state: EngineState::WaitingForAtr,
            fifo: Fifo::with_capacity(TX_FIFO_CAPACITY),
            decoder: BlockDecoder::new(kind),
            seq_tx: false,
            seq_rx: false,
            attempts_left: MAX_BLOCK_ATTEMPTS,
            resync_left: MAX_RESYNC_ATTEMPTS,
            last_sent: None,
            blocks_sent: 0,
            atr_buf: Vec::new(),
            atr: None,
            pps_buf: Vec::new(),
            rx_apdu: Vec::new(),
            awaiting_reply: false,
            extended_bwt: None,
            inter_byte: Countdown::idle(),
            atr_timer: Countdown::idle(),
            response: Countdown::idle(),
            events: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Decoded ATR of the current session, if one was received
    pub fn atr(&self) -> Option<&Atr> {
        self.atr.as_ref()
    }

    /// Saturating count of frames transmitted since construction
    pub fn blocks_sent(&self) -> u32 {
        self.blocks_sent
    }

    /// Update a configuration parameter. Checksum changes also retune the
    /// wire framer.
    pub fn set_param(&mut self, param: Param, value: ParamValue) -> Result<()> {
        self.cfg.set(param, value)?;
        if param == Param::Checksum {
            self.decoder.set_kind(self.cfg.checksum());
        }
        Ok(())
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Begin a fresh session after card activation: the ATR window opens.
    pub fn start(&mut self) -> Vec<Event> {
        self.protocol_reset();
        self.atr = None;
        self.state = EngineState::WaitingForAtr;
        self.atr_timer.start(self.cfg.get(Param::AtrTimeout));
        debug!("engine started, waiting for ATR");
        self.drain()
    }

    /// Leave the terminal error state. With `skip_atr` and a cached ATR
    /// the engine jumps straight back into negotiation; otherwise it waits
    /// for a fresh ATR like [`Engine::start`].
    pub fn reset(&mut self, skip_atr: bool, sink: &mut dyn ByteSink) -> Vec<Event> {
        self.protocol_reset();
        if skip_atr && self.atr.is_some() {
            debug!("reset with cached ATR parameters");
            self.proceed_after_atr(sink);
        } else {
            self.atr = None;
            self.state = EngineState::WaitingForAtr;
            self.atr_timer.start(self.cfg.get(Param::AtrTimeout));
        }
        self.drain()
    }

    /// Force the link into the error state (used by transports when the
    /// card disappears mid-session).
    pub fn force_error(&mut self, err: Error) -> Vec<Event> {
        self.fail(err);
        self.drain()
    }

    /// Push received wire bytes, in arrival order, any chunk size.
    pub fn feed(&mut self, bytes: &[u8], sink: &mut dyn ByteSink) -> Vec<Event> {
        trace!("rx {}", bytes_to_hex_spaced(bytes));
        for &byte in bytes {
            match self.state {
                EngineState::WaitingForAtr => self.feed_atr_byte(byte),
                EngineState::PpsExchange => self.feed_pps_byte(byte, sink),
                EngineState::Error => return self.drain(),
                _ => {
                    if let Some(result) = self.decoder.push(byte) {
                        self.inter_byte.stop();
                        self.handle_frame(result, sink);
                    } else if self.decoder.in_progress() {
                        self.inter_byte.start(self.cfg.get(Param::InterByteTimeout));
                    }
                }
            }
            if self.state == EngineState::Error {
                break;
            }
        }
        self.drain()
    }

    /// Report elapsed milliseconds since the previous call. Must be called
    /// at least once per 50 ms while connecting or connected.
    pub fn tick(&mut self, elapsed_ms: u32, sink: &mut dyn ByteSink) -> Vec<Event> {
        if self.state == EngineState::Error {
            return self.drain();
        }

        if self.atr_timer.tick(elapsed_ms) {
            self.fail(Error::AtrTimeout {
                timeout_ms: self.cfg.get(Param::AtrTimeout),
            });
            return self.drain();
        }

        if self.inter_byte.tick(elapsed_ms) {
            match self.state {
                EngineState::WaitingForAtr => {
                    // silence means the card finished talking
                    self.handle_atr_complete(sink);
                }
                _ => {
                    if self.decoder.in_progress() {
                        debug!("inter-byte timeout inside a block, dropping partial frame");
                        self.decoder.reset();
                        self.delivery_failed(RAck::OtherError, sink);
                    }
                }
            }
            return self.drain();
        }

        if self.response.tick(elapsed_ms) {
            match self.state {
                EngineState::PpsExchange => self.fail(Error::PpsFailed),
                EngineState::IfsdSetup => self.negotiation_failed(sink),
                EngineState::Resynchronizing => self.resync_failed(sink),
                EngineState::Idle | EngineState::WaitingForResponse => {
                    debug!("response timeout, prompting the card");
                    self.prompt_retransmission(sink);
                }
                _ => {}
            }
        }

        self.drain()
    }

    /// Queue an APDU for transmission. The whole chain is pre-encoded into
    /// the transmit queue before the first block goes out; if the chain
    /// does not fit, nothing is enqueued.
    pub fn submit(&mut self, apdu: &[u8], sink: &mut dyn ByteSink) -> Result<Vec<Event>> {
        match self.state {
            EngineState::Idle => {}
            EngineState::Error => return Err(Error::EngineHalted),
            EngineState::WaitingForResponse | EngineState::Resynchronizing => {
                return Err(Error::Busy)
            }
            _ => return Err(Error::NotConnected),
        }

        let kind = self.cfg.checksum();
        let ifsc = self.cfg.ifsc();
        let chunks: Vec<&[u8]> = if apdu.is_empty() {
            vec![&[][..]]
        } else {
            apdu.chunks(ifsc).collect()
        };

        let mut entries: Vec<Vec<u8>> = Vec::with_capacity(chunks.len());
        let mut seq = self.seq_tx;
        for (i, chunk) in chunks.iter().enumerate() {
            let block = Block::Info {
                more: i + 1 < chunks.len(),
                seq,
                payload: chunk.to_vec(),
            };
            entries.push(block.encode(kind)?);
            seq = !seq;
        }

        let total: usize = entries.iter().map(|e| 2 + e.len()).sum();
        if total > self.fifo.free_space() {
            return Err(Error::Internal("transmit chain does not fit in the queue"));
        }
        for entry in &entries {
            let len = entry.len() as u16;
            self.fifo.push_bytes(&len.to_le_bytes());
            self.fifo.push_bytes(entry);
        }
        debug!(
            "queued {} byte APDU as {} block(s)",
            apdu.len(),
            entries.len()
        );

        self.attempts_left = MAX_BLOCK_ATTEMPTS;
        self.awaiting_reply = true;
        self.rx_apdu.clear();
        self.state = EngineState::WaitingForResponse;
        self.send_front(sink);
        Ok(self.drain())
    }

    // --- internals -------------------------------------------------------

    fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Clear all per-session state; the configuration table survives.
    fn protocol_reset(&mut self) {
        self.fifo.clear();
        self.decoder.set_kind(self.cfg.checksum());
        self.seq_tx = false;
        self.seq_rx = false;
        self.attempts_left = MAX_BLOCK_ATTEMPTS;
        self.resync_left = MAX_RESYNC_ATTEMPTS;
        self.last_sent = None;
        self.atr_buf.clear();
        self.pps_buf.clear();
        self.rx_apdu.clear();
        self.awaiting_reply = false;
        self.extended_bwt = None;
        self.inter_byte.stop();
        self.atr_timer.stop();
        self.response.stop();
    }

    /// Single funnel for every fatal condition: local protocol reset, then
    /// exactly one error event, then the terminal state.
    fn fail(&mut self, err: Error) {
        warn!("fatal protocol error: {}", err);
        self.protocol_reset();
        self.state = EngineState::Error;
        self.events.push(Event::Error(err));
    }

    fn write_wire(&mut self, bytes: &[u8], sink: &mut dyn ByteSink) -> bool {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            if sink.write(bytes) {
                trace!("tx {}", bytes_to_hex_spaced(bytes));
                self.blocks_sent = self.blocks_sent.saturating_add(1);
                return true;
            }
            warn!("wire write failed (attempt {})", attempt);
        }
        self.fail(Error::OutputFailure {
            attempts: MAX_WRITE_ATTEMPTS,
        });
        false
    }

    fn arm_response_timer(&mut self) {
        let window = self
            .extended_bwt
            .take()
            .unwrap_or_else(|| self.cfg.get(Param::ResponseTimeout));
        self.response.start(window);
    }

    fn send_block(&mut self, block: &Block, sink: &mut dyn ByteSink) -> bool {
        let raw = match block.encode(self.cfg.checksum()) {
            Ok(raw) => raw,
            Err(e) => {
                self.fail(e);
                return false;
            }
        };
        if !self.write_wire(&raw, sink) {
            return false;
        }
        self.last_sent = Some(LastSent { raw });
        self.arm_response_timer();
        true
    }

    fn retransmit_last(&mut self, sink: &mut dyn ByteSink) {
        if let Some(last) = self.last_sent.clone() {
            debug!("retransmitting last block, {} attempt(s) left", self.attempts_left);
            if self.write_wire(&last.raw, sink) {
                self.arm_response_timer();
            }
        }
    }

    /// Peek the front queue entry: the fully-encoded in-flight block.
    fn front_entry(&self) -> Option<Vec<u8>> {
        if self.fifo.is_empty() {
            return None;
        }
        let mut cursor = self.fifo.cursor();
        let lo = self.fifo.peek_with_cursor(&mut cursor)?;
        let hi = self.fifo.peek_with_cursor(&mut cursor)?;
        let len = usize::from(u16::from_le_bytes([lo, hi]));
        let mut entry = Vec::with_capacity(len);
        for _ in 0..len {
            entry.push(self.fifo.peek_with_cursor(&mut cursor)?);
        }
        Some(entry)
    }

    /// Transmit the block at the front of the queue without consuming it.
    /// The sequence bit is re-derived from the live counter so the entry
    /// stays correct even after a resynchronization reset it.
    fn send_front(&mut self, sink: &mut dyn ByteSink) {
        let Some(entry) = self.front_entry() else {
            self.fail(Error::Internal("send requested with an empty queue"));
            return;
        };
        let block = match Block::decode(&entry, self.cfg.checksum()) {
            Ok(Block::Info { more, payload, .. }) => Block::Info {
                more,
                seq: self.seq_tx,
                payload,
            },
            Ok(_) | Err(_) => {
                self.fail(Error::Internal("transmit queue entry is not an I-block"));
                return;
            }
        };
        self.send_block(&block, sink);
    }

    /// Drop the acknowledged front entry from the queue.
    fn dequeue_front(&mut self) {
        if let Some(entry) = self.front_entry() {
            self.fifo.remove(2 + entry.len());
        }
    }

    // --- ATR / PPS / IFSD ------------------------------------------------

    fn feed_atr_byte(&mut self, byte: u8) {
        if self.atr_buf.is_empty() {
            self.atr_timer.stop();
        }
        if self.atr_buf.len() >= ATR_ACCUMULATOR_MAX {
            self.fail(Error::BadAtr("longer than 33 bytes"));
            return;
        }
        self.atr_buf.push(byte);
        self.inter_byte.start(self.cfg.get(Param::InterByteTimeout));
    }

    fn handle_atr_complete(&mut self, sink: &mut dyn ByteSink) {
        let raw = std::mem::take(&mut self.atr_buf);
        match Atr::parse(&raw) {
            Ok(atr) => {
                debug!("ATR decoded: {}", bytes_to_hex_spaced(&raw));
                self.events.push(Event::AtrReceived(atr.clone()));
                if !atr.supports_t1() {
                    self.fail(Error::BadAtr("card does not offer T=1"));
                    return;
                }
                self.apply_atr_hints(&atr);
                self.atr = Some(atr);
                self.proceed_after_atr(sink);
            }
            Err(e) => self.fail(e),
        }
    }

    fn apply_atr_hints(&mut self, atr: &Atr) {
        if let Some(ifsc) = atr.ifsc_hint() {
            let clamped = u32::from(ifsc).clamp(1, 254);
            // clamped into the permitted range, so set cannot fail
            let _ = self.cfg.set(Param::Ifsc, ParamValue::Value(clamped));
        }
        if atr.crc_requested() {
            let _ = self.cfg.set(Param::Checksum, ParamValue::Value(1));
            self.decoder.set_kind(self.cfg.checksum());
        }
    }

    fn proceed_after_atr(&mut self, sink: &mut dyn ByteSink) {
        let specific = self.atr.as_ref().is_some_and(|a| a.specific_mode());
        if self.cfg.auto_pps() || specific {
            debug!("skipping PPS (auto-PPS or specific mode)");
            self.begin_ifsd(sink);
        } else {
            self.begin_pps(sink);
        }
    }

    fn begin_pps(&mut self, sink: &mut dyn ByteSink) {
        // PPS0 names T=1, no optional parameter bytes; PCK closes the XOR
        let request = [PPSS, 0x01, PPSS ^ 0x01];
        self.pps_buf.clear();
        self.state = EngineState::PpsExchange;
        if self.write_wire(&request, sink) {
            self.arm_response_timer();
        }
    }

    fn feed_pps_byte(&mut self, byte: u8, sink: &mut dyn ByteSink) {
        self.pps_buf.push(byte);
        if self.pps_buf.len() < 2 {
            return;
        }
        // PPS0 presence bits announce up to three optional parameter bytes
        let pps0 = self.pps_buf[1];
        let expected = 3 + usize::from((pps0 >> 4) & 1)
            + usize::from((pps0 >> 5) & 1)
            + usize::from((pps0 >> 6) & 1);
        if self.pps_buf.len() < expected {
            return;
        }

        let xor = self.pps_buf.iter().fold(0u8, |acc, &b| acc ^ b);
        let ok = self.pps_buf[0] == PPSS && pps0 & 0x0F == 0x01 && xor == 0;
        if ok {
            debug!("PPS accepted by the card");
            self.response.stop();
            self.begin_ifsd(sink);
        } else {
            self.fail(Error::PpsFailed);
        }
    }

    fn begin_ifsd(&mut self, sink: &mut dyn ByteSink) {
        self.state = EngineState::IfsdSetup;
        self.attempts_left = MAX_BLOCK_ATTEMPTS;
        let block = Block::Supervisory {
            cmd: SCommand::Ifs,
            response: false,
            param: Some(self.cfg.ifsd() as u8),
        };
        self.send_block(&block, sink);
    }

    fn negotiation_failed(&mut self, sink: &mut dyn ByteSink) {
        self.attempts_left = self.attempts_left.saturating_sub(1);
        if self.attempts_left == 0 {
            self.fail(Error::IfsdFailed);
        } else {
            self.retransmit_last(sink);
        }
    }

    // --- connected-state block handling ----------------------------------

    fn handle_frame(&mut self, result: Result<Block>, sink: &mut dyn ByteSink) {
        match result {
            Ok(block) => self.handle_block(block, sink),
            Err(e) => {
                debug!("bad inbound frame: {}", e);
                let nack = match e {
                    Error::ChecksumMismatch { .. } => RAck::CrcError,
                    _ => RAck::OtherError,
                };
                self.delivery_failed(nack, sink);
            }
        }
    }

    fn handle_block(&mut self, block: Block, sink: &mut dyn ByteSink) {
        match block {
            Block::Info { more, seq, payload } => self.handle_info(more, seq, payload, sink),
            Block::ReceiveReady { ack, seq } => self.handle_rr(ack, seq, sink),
            Block::Supervisory {
                cmd,
                response: false,
                param,
            } => self.handle_s_request(cmd, param, sink),
            Block::Supervisory {
                cmd,
                response: true,
                param,
            } => self.handle_s_response(cmd, param, sink),
        }
    }

    fn handle_info(&mut self, more: bool, seq: bool, payload: Vec<u8>, sink: &mut dyn ByteSink) {
        if self.state == EngineState::IfsdSetup || self.state == EngineState::Resynchronizing {
            self.delivery_failed(RAck::OtherError, sink);
            return;
        }

        // an inbound I-block implicitly acknowledges our outstanding one
        if !self.fifo.is_empty() {
            self.dequeue_front();
            self.seq_tx = !self.seq_tx;
            self.attempts_left = MAX_BLOCK_ATTEMPTS;
        }

        if seq != self.seq_rx {
            // duplicate of a block we already accepted
            debug!("duplicate I-block (seq mismatch), re-acknowledging");
            self.attempts_left = self.attempts_left.saturating_sub(1);
            if self.attempts_left == 0 {
                self.enter_resync(sink);
                return;
            }
            let rr = Block::ReceiveReady {
                ack: RAck::Ok,
                seq: self.seq_rx,
            };
            self.send_block(&rr, sink);
            return;
        }

        self.seq_rx = !self.seq_rx;
        self.rx_apdu.extend_from_slice(&payload);
        let max = self.cfg.get(Param::MaxApduLen) as usize;
        if self.rx_apdu.len() > max {
            self.fail(Error::OversizedApdu { max });
            return;
        }

        if more {
            let rr = Block::ReceiveReady {
                ack: RAck::Ok,
                seq: self.seq_rx,
            };
            self.state = EngineState::WaitingForResponse;
            self.send_block(&rr, sink);
        } else {
            let apdu = std::mem::take(&mut self.rx_apdu);
            self.awaiting_reply = false;
            self.attempts_left = MAX_BLOCK_ATTEMPTS;
            self.response.stop();
            self.state = EngineState::Idle;
            debug!("APDU reassembled, {} bytes", apdu.len());
            self.events.push(Event::ApduReceived(apdu));
        }
    }

    fn handle_rr(&mut self, ack: RAck, seq: bool, sink: &mut dyn ByteSink) {
        if self.state == EngineState::Resynchronizing {
            self.resync_failed(sink);
            return;
        }
        match ack {
            RAck::Ok if seq != self.seq_tx => {
                // the card wants the next block: ours was delivered
                self.dequeue_front();
                self.seq_tx = !self.seq_tx;
                self.attempts_left = MAX_BLOCK_ATTEMPTS;
                if self.fifo.is_empty() {
                    self.state = EngineState::Idle;
                    if self.awaiting_reply {
                        self.arm_response_timer();
                    }
                } else {
                    self.send_front(sink);
                }
            }
            RAck::Ok => {
                debug!("R-block acknowledges the wrong sequence bit");
                self.delivery_retry(sink);
            }
            RAck::CrcError | RAck::OtherError => {
                debug!("card reported a corrupt delivery");
                self.delivery_retry(sink);
            }
        }
    }

    /// The card asked for our block again (NACK or mismatched ack).
    fn delivery_retry(&mut self, sink: &mut dyn ByteSink) {
        if self.state == EngineState::IfsdSetup {
            self.negotiation_failed(sink);
            return;
        }
        self.attempts_left = self.attempts_left.saturating_sub(1);
        if self.attempts_left == 0 {
            self.enter_resync(sink);
        } else {
            self.retransmit_last(sink);
        }
    }

    /// We received garbage: ask the card to repeat, on the same shared
    /// attempt budget.
    fn delivery_failed(&mut self, nack: RAck, sink: &mut dyn ByteSink) {
        match self.state {
            EngineState::Resynchronizing => self.resync_failed(sink),
            EngineState::IfsdSetup => self.negotiation_failed(sink),
            _ => {
                self.attempts_left = self.attempts_left.saturating_sub(1);
                if self.attempts_left == 0 {
                    self.enter_resync(sink);
                } else {
                    let rr = Block::ReceiveReady {
                        ack: nack,
                        seq: self.seq_rx,
                    };
                    self.send_block(&rr, sink);
                }
            }
        }
    }

    /// Response window expired: request a repeat of the card's block.
    fn prompt_retransmission(&mut self, sink: &mut dyn ByteSink) {
        self.attempts_left = self.attempts_left.saturating_sub(1);
        if self.attempts_left == 0 {
            self.enter_resync(sink);
            return;
        }
        let rr = Block::ReceiveReady {
            ack: RAck::Ok,
            seq: self.seq_rx,
        };
        self.send_block(&rr, sink);
    }

    fn handle_s_request(&mut self, cmd: SCommand, param: Option<u8>, sink: &mut dyn ByteSink) {
        match cmd {
            SCommand::Ifs => {
                let Some(v) = param else {
                    self.delivery_failed(RAck::OtherError, sink);
                    return;
                };
                if v == 0 || v == 0xFF {
                    self.delivery_failed(RAck::OtherError, sink);
                    return;
                }
                // card-requested IFSC, clamped into the permitted range
                let clamped = u32::from(v).clamp(1, 254);
                let _ = self.cfg.set(Param::Ifsc, ParamValue::Value(clamped));
                debug!("card changed IFSC to {}", clamped);
                let reply = Block::Supervisory {
                    cmd: SCommand::Ifs,
                    response: true,
                    param: Some(clamped as u8),
                };
                self.send_block(&reply, sink);
            }
            SCommand::Wtx => {
                let Some(m) = param else {
                    self.delivery_failed(RAck::OtherError, sink);
                    return;
                };
                let base = self.cfg.get(Param::ResponseTimeout);
                let max = self.cfg.get(Param::MaxResponseTimeout);
                let extended = base.saturating_mul(u32::from(m.max(1))).min(max);
                self.extended_bwt = Some(extended);
                debug!("wait time extension x{}, window {} ms", m, extended);
                let reply = Block::Supervisory {
                    cmd: SCommand::Wtx,
                    response: true,
                    param: Some(m),
                };
                // sequence state is deliberately untouched
                self.send_block(&reply, sink);
            }
            SCommand::Abort => {
                self.fail(Error::Aborted);
            }
            SCommand::Resync => {
                self.seq_tx = false;
                self.seq_rx = false;
                let reply = Block::Supervisory {
                    cmd: SCommand::Resync,
                    response: true,
                    param: None,
                };
                self.send_block(&reply, sink);
            }
        }
    }

    fn handle_s_response(&mut self, cmd: SCommand, param: Option<u8>, sink: &mut dyn ByteSink) {
        match (self.state, cmd) {
            (EngineState::IfsdSetup, SCommand::Ifs) => {
                if param == Some(self.cfg.ifsd() as u8) {
                    debug!("IFSD accepted, link is up");
                    self.response.stop();
                    self.attempts_left = MAX_BLOCK_ATTEMPTS;
                    self.state = EngineState::Idle;
                    self.events.push(Event::Connected);
                } else {
                    self.negotiation_failed(sink);
                }
            }
            (EngineState::Resynchronizing, SCommand::Resync) => {
                debug!("resynchronization accepted");
                self.seq_tx = false;
                self.seq_rx = false;
                self.attempts_left = MAX_BLOCK_ATTEMPTS;
                self.response.stop();
                if self.fifo.is_empty() {
                    self.state = EngineState::Idle;
                    if self.awaiting_reply {
                        self.arm_response_timer();
                    }
                } else {
                    self.state = EngineState::WaitingForResponse;
                    self.send_front(sink);
                }
            }
            _ => self.delivery_failed(RAck::OtherError, sink),
        }
    }

    fn enter_resync(&mut self, sink: &mut dyn ByteSink) {
        debug!("delivery attempts exhausted, resynchronizing");
        self.state = EngineState::Resynchronizing;
        self.resync_left = MAX_RESYNC_ATTEMPTS;
        self.send_resync(sink);
    }

    fn send_resync(&mut self, sink: &mut dyn ByteSink) {
        let block = Block::Supervisory {
            cmd: SCommand::Resync,
            response: false,
            param: None,
        };
        self.send_block(&block, sink);
    }

    fn resync_failed(&mut self, sink: &mut dyn ByteSink) {
        self.resync_left = self.resync_left.saturating_sub(1);
        if self.resync_left == 0 {
            self.fail(Error::CommFailure);
        } else {
            self.send_resync(sink);
        }
    }
}
