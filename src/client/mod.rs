//! Store client module
//!
//! Defines the abstract capability the exporter needs from a key-value
//! store (paged key scan, TTL/type lookup, per-type full reads) and the
//! concrete RESP2 connection that provides it. The dump core only ever
//! talks to the trait, so it can be driven by a fake store in tests.

mod connection;

pub use connection::RedisConnection;

use crate::error::DumpError;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// Stored type tag of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Scalar string value
    String,
    /// Ordered sequence of values
    List,
    /// Unordered set of unique members
    Set,
    /// Ordered set of (member, score) pairs
    SortedSet,
    /// Field -> value mapping
    Hash,
}

impl KeyType {
    /// Map a TYPE reply tag to a key type; None for tags we do not know
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(KeyType::String),
            "list" => Some(KeyType::List),
            "set" => Some(KeyType::Set),
            "zset" => Some(KeyType::SortedSet),
            "hash" => Some(KeyType::Hash),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::SortedSet => "zset",
            KeyType::Hash => "hash",
        };
        write!(f, "{}", tag)
    }
}

/// Remaining time-to-live of a key at read time
///
/// "No expiration" is distinct from a zero remainder: a key with no
/// expiration lives forever, a key with zero remainder is about to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// No expiration scheduled
    None,
    /// Non-negative remaining duration
    Remaining(Duration),
}

impl Ttl {
    /// Whether an expiration is scheduled
    pub fn is_present(&self) -> bool {
        matches!(self, Ttl::Remaining(_))
    }
}

/// One page of a cursor-driven key scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to resume from; 0 means the scan is complete
    pub cursor: u64,
    /// Keys in this page (may be empty even mid-scan)
    pub keys: Vec<Bytes>,
}

/// Abstract read capability over the store being exported
///
/// One method per store operation the exporter performs. Every call is a
/// single blocking round trip; implementations never retry.
#[async_trait]
pub trait StoreClient {
    /// Fetch one scan page: up to `count` keys matching the glob `pattern`,
    /// starting at `cursor`
    async fn scan_page(
        &mut self,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<ScanPage, DumpError>;

    /// Remaining TTL of a key
    async fn ttl(&mut self, key: &Bytes) -> Result<Ttl, DumpError>;

    /// Stored type tag of a key
    async fn key_type(&mut self, key: &Bytes) -> Result<KeyType, DumpError>;

    /// Scalar value of a string key
    async fn get(&mut self, key: &Bytes) -> Result<Bytes, DumpError>;

    /// Full contents of a list key, in order
    async fn list_range(&mut self, key: &Bytes) -> Result<Vec<Bytes>, DumpError>;

    /// All members of a set key
    async fn set_members(&mut self, key: &Bytes) -> Result<Vec<Bytes>, DumpError>;

    /// Full contents of a sorted-set key as (member, score) pairs
    async fn sorted_set_range(&mut self, key: &Bytes) -> Result<Vec<(Bytes, f64)>, DumpError>;

    /// All (field, value) pairs of a hash key
    async fn hash_entries(&mut self, key: &Bytes) -> Result<Vec<(Bytes, Bytes)>, DumpError>;
}
