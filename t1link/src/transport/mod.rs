// t1link/src/transport/mod.rs
//! Reader hardware adapters behind the [`traits::CardTransport`] contract.

pub mod ccid;
pub mod mock;
pub mod serial;
pub mod traits;

pub use ccid::{BulkPipe, CcidTransport, T1Parameters};
pub use mock::MockTransport;
pub use serial::{LineConfig, SerialTransport, SmartCardPort};
pub use traits::CardTransport;
