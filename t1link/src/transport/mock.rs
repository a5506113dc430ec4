// t1link/src/transport/mock.rs
//! Scriptable in-memory transport for tests.

use std::collections::VecDeque;

use crate::transport::traits::CardTransport;
use crate::{Error, Result};

/// Mock transport for unit tests. It records sent frames and returns
/// pre-scripted inbound chunks; presence and write failures are test hooks.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Every frame passed to `send`, in order
    pub sent: Vec<Vec<u8>>,
    /// Chunks future `poll` calls will return, front first
    pub inbound: VecDeque<Vec<u8>>,
    /// Simulated slot state
    pub present: bool,
    /// Whether `activate` has run (and `deactivate` has not)
    pub activated: bool,
    /// Value reported through `CardTransport::auto_pps`
    pub auto_pps: bool,
    /// Number of subsequent `send` calls that should fail
    pub send_failures: usize,
}

impl MockTransport {
    /// A mock with a card present and nothing scripted.
    pub fn new() -> Self {
        Self {
            present: true,
            ..Self::default()
        }
    }

    /// Queue a chunk the next `poll` call will return.
    pub fn push_inbound(&mut self, chunk: Vec<u8>) {
        self.inbound.push_back(chunk);
    }

    /// Simulate card insertion/removal.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Make the next `n` sends fail (for write-retry tests).
    pub fn set_send_failures(&mut self, n: usize) {
        self.send_failures = n;
    }

    /// Take the most recently sent frame.
    pub fn pop_sent(&mut self) -> Option<Vec<u8>> {
        self.sent.pop()
    }
}

impl CardTransport for MockTransport {
    fn activate(&mut self) -> Result<()> {
        if !self.present {
            return Err(Error::NoCard);
        }
        self.activated = true;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.activated = false;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if self.send_failures > 0 {
            self.send_failures -= 1;
            return Err(Error::Timeout);
        }
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<u8>> {
        Ok(self.inbound.pop_front().unwrap_or_default())
    }

    fn card_present(&mut self) -> bool {
        self.present
    }

    fn auto_pps(&self) -> bool {
        self.auto_pps
    }
}
