// t1link/src/transport/traits.rs
//! The contract every reader adapter implements.

use crate::Result;

/// CardTransport abstracts reader hardware away from the protocol engine
/// and the connection layer.
///
/// The contract is byte-stream shaped on both directions: `send` pushes raw
/// frame bytes toward the card, `poll` drains whatever arrived since the
/// last call, in order, possibly empty and possibly a partial frame. Block
/// oriented hardware (CCID) adapts itself to this contract internally.
pub trait CardTransport {
    /// Power the card up and run the reset sequence. After this returns
    /// the card starts answering with its ATR bytes.
    fn activate(&mut self) -> Result<()>;

    /// Power the card down and release the interface.
    fn deactivate(&mut self) -> Result<()>;

    /// Transmit raw bytes toward the card.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drain bytes received since the previous call. Order-preserving;
    /// an empty vector just means nothing arrived yet.
    fn poll(&mut self) -> Result<Vec<u8>>;

    /// Current card presence.
    fn card_present(&mut self) -> bool;

    /// True when the reader negotiates PPS itself and the engine must
    /// skip its own exchange.
    fn auto_pps(&self) -> bool {
        false
    }
}
