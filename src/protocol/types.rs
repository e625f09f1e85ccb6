//! RESP2 reply types
//!
//! Defines the value shapes a server can answer with, plus the protocol
//! error type shared by the parser and the connection layer.

use bytes::Bytes;
use std::fmt;

/// A single RESP2 server reply
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Simple strings: +OK\r\n
    Simple(String),

    /// Errors: -ERR message\r\n
    Error(String),

    /// Integers: :1000\r\n
    Integer(i64),

    /// Bulk strings: $6\r\nfoobar\r\n
    Bulk(Bytes),

    /// Null bulk string ($-1\r\n) or null array (*-1\r\n)
    Null,

    /// Arrays: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    Array(Vec<Reply>),
}

impl Reply {
    /// Try to extract bulk string bytes
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            Reply::Bulk(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Try to extract integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to consume the reply as array elements
    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Text content of a simple or bulk string reply, if it is valid UTF-8
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Simple(s) => Some(s),
            Reply::Bulk(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "Simple({})", s),
            Reply::Error(e) => write!(f, "Error({})", e),
            Reply::Integer(i) => write!(f, "Integer({})", i),
            Reply::Bulk(b) => write!(f, "Bulk({} bytes)", b.len()),
            Reply::Null => write!(f, "Null"),
            Reply::Array(arr) => write!(f, "Array({} elements)", arr.len()),
        }
    }
}

/// RESP parsing errors
#[derive(Debug, Clone, PartialEq)]
pub enum RespError {
    /// Invalid protocol format
    InvalidProtocol(String),

    /// Invalid UTF-8 in a textual frame
    InvalidUtf8,

    /// Integer overflow in a length or integer frame
    IntegerOverflow,
}

impl fmt::Display for RespError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespError::InvalidProtocol(msg) => write!(f, "Invalid protocol: {}", msg),
            RespError::InvalidUtf8 => write!(f, "Invalid UTF-8"),
            RespError::IntegerOverflow => write!(f, "Integer overflow"),
        }
    }
}

impl std::error::Error for RespError {}
