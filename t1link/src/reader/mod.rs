// t1link/src/reader/mod.rs
//! Reader factory: owns the transport, hands out one session at a time.

pub mod connection;

pub use connection::{Connection, LinkObserver};

use log::debug;

use crate::config::{Config, Param, ParamValue};
use crate::protocol::engine::Engine;
use crate::transport::traits::CardTransport;
use crate::{Error, Result};

/// A card reader. Owns the transport; [`Reader::connect`] hands out a
/// [`Connection`] that mutably borrows the reader, so the borrow checker
/// enforces one active session at a time.
pub struct Reader {
    transport: Box<dyn CardTransport>,
    cfg: Config,
}

impl Reader {
    /// A reader over `transport` with default protocol parameters.
    pub fn new(transport: Box<dyn CardTransport>) -> Self {
        Self::with_config(transport, Config::default())
    }

    /// A reader with explicit protocol parameters for its sessions.
    pub fn with_config(transport: Box<dyn CardTransport>, cfg: Config) -> Self {
        Self { transport, cfg }
    }

    /// Card presence as the transport reports it.
    pub fn card_present(&mut self) -> bool {
        self.transport.card_present()
    }

    /// Update the configuration used for future sessions.
    pub fn set_param(&mut self, param: Param, value: ParamValue) -> Result<()> {
        self.cfg.set(param, value)
    }

    /// Begin a session with the inserted card. Fails fast when the slot is
    /// empty. The returned connection must still be established before
    /// APDUs can flow.
    pub fn connect(&mut self) -> Result<Connection<'_>> {
        if !self.transport.card_present() {
            return Err(Error::NoCard);
        }
        let mut cfg = self.cfg.clone();
        if self.transport.auto_pps() {
            debug!("reader negotiates PPS itself");
            cfg.set(Param::AutoPps, ParamValue::Value(1))?;
        }
        Ok(Connection::new(
            self.transport.as_mut(),
            Engine::new(cfg),
        ))
    }
}
