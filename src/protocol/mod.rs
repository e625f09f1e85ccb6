//! RESP2 protocol implementation (client side)
//!
//! This module handles encoding of outgoing command requests and parsing of
//! server replies. It is completely independent from other modules
//! (loose coupling).

mod resp;
mod types;

pub use resp::{encode_command, ReplyParser};
pub use types::{Reply, RespError};
