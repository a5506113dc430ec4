// t1link/src/reader/connection.rs
//! Host-facing connection object.
//!
//! A `Connection` pumps bytes between one [`CardTransport`] and one
//! protocol [`Engine`]. Hosts choose a calling convention: the blocking
//! helpers (`establish`, `transmit`) spin-poll at the 50 ms pump interval
//! on the caller's thread, or the host runs its own loop and calls
//! [`Connection::pump`] with measured elapsed time. Observers are
//! notified after each entry point has fully completed, in event order.

use std::time::Instant;

use log::{debug, warn};

use crate::config::{Param, ParamValue};
use crate::protocol::atr::Atr;
use crate::protocol::engine::{ByteSink, Engine, EngineState, Event};
use crate::transport::traits::CardTransport;
use crate::utils::timeout::{ms, POLL_INTERVAL_MS};
use crate::{Error, Result};

/// Observer of protocol events. Registered observers see every event in
/// the order the engine emitted it.
pub trait LinkObserver {
    /// Called once per event, after the entry point that produced it
    /// has fully completed.
    fn on_event(&mut self, event: &Event);
}

struct TransportSink<'s> {
    inner: &'s mut dyn CardTransport,
}

impl ByteSink for TransportSink<'_> {
    fn write(&mut self, bytes: &[u8]) -> bool {
        self.inner.send(bytes).is_ok()
    }
}

/// An exclusive session with one card.
pub struct Connection<'a> {
    transport: &'a mut dyn CardTransport,
    engine: Engine,
    observers: Vec<Box<dyn LinkObserver>>,
    last_response: Option<Vec<u8>>,
    fatal: Option<Error>,
    last_tick: Instant,
    released: bool,
}

impl<'a> Connection<'a> {
    pub(crate) fn new(transport: &'a mut dyn CardTransport, engine: Engine) -> Self {
        Self {
            transport,
            engine,
            observers: Vec::new(),
            last_response: None,
            fatal: None,
            last_tick: Instant::now(),
            released: false,
        }
    }

    /// Register an observer for protocol events.
    pub fn observe(&mut self, observer: Box<dyn LinkObserver>) {
        self.observers.push(observer);
    }

    /// Engine state, for hosts running their own pump loop.
    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    /// ATR of the current session, once received.
    pub fn atr(&self) -> Option<&Atr> {
        self.engine.atr()
    }

    /// Per-session parameter override (timeouts, IFS, checksum, ...).
    pub fn set_param(&mut self, param: Param, value: ParamValue) -> Result<()> {
        self.engine.set_param(param, value)
    }

    /// The session's effective configuration.
    pub fn config(&self) -> &crate::config::Config {
        self.engine.config()
    }

    /// Card presence as the transport reports it right now.
    pub fn card_present(&mut self) -> bool {
        self.transport.card_present()
    }

    /// Advance the session: drain received bytes into the engine and
    /// account `elapsed_ms` of wall time. Non-blocking hosts call this at
    /// least every 50 ms.
    pub fn pump(&mut self, elapsed_ms: u32) -> Result<()> {
        if self.engine.state() != EngineState::Error && !self.transport.card_present() {
            warn!("card disappeared mid-session");
            let events = self.engine.force_error(Error::CardRemoved);
            self.absorb(events);
            return Ok(());
        }

        let data = self.transport.poll()?;
        if !data.is_empty() {
            let mut sink = TransportSink {
                inner: &mut *self.transport,
            };
            let events = self.engine.feed(&data, &mut sink);
            self.absorb(events);
        }

        let mut sink = TransportSink {
            inner: &mut *self.transport,
        };
        let events = self.engine.tick(elapsed_ms, &mut sink);
        self.absorb(events);
        Ok(())
    }

    /// Activate the card and drive negotiation to completion, blocking the
    /// calling thread.
    pub fn establish(&mut self) -> Result<()> {
        self.transport.activate()?;
        let events = self.engine.start();
        self.absorb(events);
        self.last_tick = Instant::now();
        self.block_until(|state| state == EngineState::Idle)?;
        debug!("session established");
        Ok(())
    }

    /// Exchange one APDU, blocking until the response is reassembled.
    pub fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        self.transmit_raw(apdu)?;
        self.block_until(|state| state == EngineState::Idle)?;
        self.take_response()
            .ok_or(Error::Internal("exchange finished without a response"))
    }

    /// Queue an APDU without blocking. The response surfaces through
    /// observers and [`Connection::take_response`].
    pub fn transmit_raw(&mut self, apdu: &[u8]) -> Result<()> {
        self.last_response = None;
        let mut sink = TransportSink {
            inner: &mut *self.transport,
        };
        let events = self.engine.submit(apdu, &mut sink)?;
        self.absorb(events);
        if let Some(e) = self.fatal.take() {
            return Err(e);
        }
        Ok(())
    }

    /// The most recent reassembled response APDU, consumed on read.
    pub fn take_response(&mut self) -> Option<Vec<u8>> {
        self.last_response.take()
    }

    /// Recover from a fatal protocol error. With `skip_atr` the cached ATR
    /// parameters are reused and negotiation restarts immediately.
    pub fn reset(&mut self, skip_atr: bool) -> Result<()> {
        if !skip_atr {
            self.transport.deactivate()?;
            self.transport.activate()?;
        }
        let mut sink = TransportSink {
            inner: &mut *self.transport,
        };
        let events = self.engine.reset(skip_atr, &mut sink);
        self.absorb(events);
        self.last_tick = Instant::now();
        self.block_until(|state| state == EngineState::Idle)
    }

    /// Power the card down and end the session.
    pub fn disconnect(mut self) -> Result<()> {
        self.released = true;
        self.transport.deactivate()
    }

    fn block_until(&mut self, done: impl Fn(EngineState) -> bool) -> Result<()> {
        loop {
            match self.engine.state() {
                state if done(state) => return Ok(()),
                EngineState::Error => {
                    return Err(self.fatal.take().unwrap_or(Error::EngineHalted));
                }
                _ => {}
            }
            std::thread::sleep(ms(u64::from(POLL_INTERVAL_MS)));
            let now = Instant::now();
            let elapsed = now.duration_since(self.last_tick).as_millis() as u32;
            self.last_tick = now;
            self.pump(elapsed)?;
        }
    }

    /// Notify observers, then fold the events into cached session state.
    fn absorb(&mut self, events: Vec<Event>) {
        for event in &events {
            for observer in &mut self.observers {
                observer.on_event(event);
            }
        }
        for event in events {
            match event {
                Event::ApduReceived(apdu) => self.last_response = Some(apdu),
                Event::Error(e) => self.fatal = Some(e),
                Event::AtrReceived(_) | Event::Connected => {}
            }
        }
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.transport.deactivate();
        }
    }
}
