//! ferrum-dump - Export a Redis-compatible key-value store as a replayable script
//!
//! The exporter walks the full key space with a cursor-paged scan and
//! writes one reconstruction command per line; replaying the script
//! against an empty store reproduces every exported key's type, value
//! and expiration. Modules follow strong cohesion and loose coupling:
//! - protocol: RESP2 wire codec, independent of everything else
//! - client: abstract store capability plus the concrete connection
//! - dump: the scan-and-serialize pipeline, pure where possible
//!
//! The export is fully sequential with no snapshot isolation: it observes
//! the store as independent point reads, so concurrent writers can make a
//! dump non-atomic. This is a documented best-effort limitation.

pub mod client;
pub mod config;
pub mod dump;
pub mod error;
pub mod protocol;

/// Re-export commonly used types
pub use client::{KeyType, RedisConnection, ScanPage, StoreClient, Ttl};
pub use config::DumpConfig;
pub use dump::{export, DumpValue};
pub use error::DumpError;
