// t1link/src/protocol/mod.rs
//! T=1 protocol core: block codec, wire framer, ATR decoding and the
//! event-driven engine. Everything here is transport-agnostic; bytes come
//! in through [`engine::Engine::feed`] and go out through a
//! [`engine::ByteSink`].

pub mod atr;
pub mod block;
pub mod checksum;
pub mod decoder;
pub mod engine;
pub mod fifo;
pub mod timer;

pub use atr::Atr;
pub use block::{Block, RAck, SCommand};
pub use decoder::BlockDecoder;
pub use engine::{ByteSink, Engine, EngineState, Event};
