//! Export error taxonomy
//!
//! Every store round trip and every emission step funnels into DumpError;
//! the first error aborts the whole export, so there is no partial-failure
//! bookkeeping here.

use crate::client::KeyType;
use crate::protocol::RespError;
use bytes::Bytes;
use std::fmt;
use std::io;

/// Errors that abort an export
#[derive(Debug)]
pub enum DumpError {
    /// Socket or sink I/O failure
    Io(io::Error),

    /// The server's byte stream was not valid RESP2
    Protocol(RespError),

    /// The server answered a command with an error reply
    Server(String),

    /// The server answered with a reply of an unexpected shape
    UnexpectedReply(String),

    /// A key enumerated by the scan no longer existed when it was resolved.
    /// The export has no snapshot isolation, so this is surfaced rather
    /// than silently skipped.
    KeyVanished(Bytes),

    /// The key's type has no reconstruction strategy yet
    UnsupportedType { key: Bytes, kind: KeyType },
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::Io(e) => write!(f, "I/O error: {}", e),
            DumpError::Protocol(e) => write!(f, "Protocol error: {}", e),
            DumpError::Server(msg) => write!(f, "Server error: {}", msg),
            DumpError::UnexpectedReply(msg) => write!(f, "Unexpected reply: {}", msg),
            DumpError::KeyVanished(key) => write!(
                f,
                "Key '{}' vanished during the scan",
                String::from_utf8_lossy(key)
            ),
            DumpError::UnsupportedType { key, kind } => write!(
                f,
                "Key '{}' has type {} which is not supported yet",
                String::from_utf8_lossy(key),
                kind
            ),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DumpError::Io(e) => Some(e),
            DumpError::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DumpError {
    fn from(e: io::Error) -> Self {
        DumpError::Io(e)
    }
}

impl From<RespError> for DumpError {
    fn from(e: RespError) -> Self {
        DumpError::Protocol(e)
    }
}
