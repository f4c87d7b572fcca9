//! Protocol layer: message classification and handshake negotiation.

pub mod classify;
pub mod handshake;

pub use classify::{batch_has_request, classify, classify_batch, classify_line, encode_line};
pub use handshake::Handshake;
