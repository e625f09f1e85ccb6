//! RESP2 connection to the store
//!
//! Owns the TCP stream and the read/write buffers, performs one blocking
//! round trip per command, and decodes raw replies into the typed results
//! the `StoreClient` trait promises.

use super::{KeyType, ScanPage, StoreClient, Ttl};
use crate::config::DumpConfig;
use crate::error::DumpError;
use crate::protocol::{encode_command, Reply, ReplyParser};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// A connected RESP2 client
pub struct RedisConnection {
    /// TCP stream
    stream: TcpStream,

    /// Read buffer
    read_buffer: BytesMut,

    /// Write buffer
    write_buffer: BytesMut,
}

impl RedisConnection {
    /// Connect to the store and run the session handshake
    ///
    /// Issues AUTH when a password is configured and SELECT when a
    /// non-default database index is configured.
    pub async fn connect(config: &DumpConfig) -> Result<Self, DumpError> {
        let stream = TcpStream::connect(&config.address).await?;
        debug!("Connected to {}", config.address);

        let mut conn = RedisConnection {
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
        };

        if !config.password.is_empty() {
            conn.command(vec![
                Bytes::from_static(b"AUTH"),
                Bytes::from(config.password.clone()),
            ])
            .await?;
        }

        if config.db != 0 {
            conn.command(vec![
                Bytes::from_static(b"SELECT"),
                Bytes::from(config.db.to_string()),
            ])
            .await?;
        }

        Ok(conn)
    }

    /// Send one command and wait for its reply
    ///
    /// An error reply from the server is folded into `DumpError::Server`,
    /// so callers only ever see successful reply shapes.
    pub async fn command(&mut self, args: Vec<Bytes>) -> Result<Reply, DumpError> {
        self.write_buffer.clear();
        encode_command(&mut self.write_buffer, &args);
        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;

        loop {
            if let Some(reply) = ReplyParser::parse(&mut self.read_buffer)? {
                debug!("Reply: {}", reply);
                return match reply {
                    Reply::Error(msg) => Err(DumpError::Server(msg)),
                    other => Ok(other),
                };
            }

            // Need more data
            let n = self.stream.read_buf(&mut self.read_buffer).await?;
            if n == 0 {
                return Err(DumpError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-reply",
                )));
            }
        }
    }
}

#[async_trait]
impl StoreClient for RedisConnection {
    async fn scan_page(
        &mut self,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<ScanPage, DumpError> {
        let reply = self
            .command(vec![
                Bytes::from_static(b"SCAN"),
                Bytes::from(cursor.to_string()),
                Bytes::from_static(b"MATCH"),
                Bytes::from(pattern.to_string()),
                Bytes::from_static(b"COUNT"),
                Bytes::from(count.to_string()),
            ])
            .await?;
        decode_scan_page(reply)
    }

    async fn ttl(&mut self, key: &Bytes) -> Result<Ttl, DumpError> {
        let reply = self
            .command(vec![Bytes::from_static(b"TTL"), key.clone()])
            .await?;
        decode_ttl(key, reply)
    }

    async fn key_type(&mut self, key: &Bytes) -> Result<KeyType, DumpError> {
        let reply = self
            .command(vec![Bytes::from_static(b"TYPE"), key.clone()])
            .await?;
        decode_key_type(key, reply)
    }

    async fn get(&mut self, key: &Bytes) -> Result<Bytes, DumpError> {
        let reply = self
            .command(vec![Bytes::from_static(b"GET"), key.clone()])
            .await?;
        match reply {
            Reply::Bulk(value) => Ok(value),
            // The key was enumerated but is gone by now
            Reply::Null => Err(DumpError::KeyVanished(key.clone())),
            other => Err(unexpected("GET", &other)),
        }
    }

    async fn list_range(&mut self, key: &Bytes) -> Result<Vec<Bytes>, DumpError> {
        let reply = self
            .command(vec![
                Bytes::from_static(b"LRANGE"),
                key.clone(),
                Bytes::from_static(b"0"),
                Bytes::from_static(b"-1"),
            ])
            .await?;
        decode_bulk_list("LRANGE", reply)
    }

    async fn set_members(&mut self, key: &Bytes) -> Result<Vec<Bytes>, DumpError> {
        let reply = self
            .command(vec![Bytes::from_static(b"SMEMBERS"), key.clone()])
            .await?;
        decode_bulk_list("SMEMBERS", reply)
    }

    async fn sorted_set_range(&mut self, key: &Bytes) -> Result<Vec<(Bytes, f64)>, DumpError> {
        let reply = self
            .command(vec![
                Bytes::from_static(b"ZRANGE"),
                key.clone(),
                Bytes::from_static(b"0"),
                Bytes::from_static(b"-1"),
                Bytes::from_static(b"WITHSCORES"),
            ])
            .await?;
        decode_scored_members(reply)
    }

    async fn hash_entries(&mut self, key: &Bytes) -> Result<Vec<(Bytes, Bytes)>, DumpError> {
        let reply = self
            .command(vec![Bytes::from_static(b"HGETALL"), key.clone()])
            .await?;
        decode_field_pairs(reply)
    }
}

/// Build the unexpected-reply error for a command
fn unexpected(command: &str, reply: &Reply) -> DumpError {
    DumpError::UnexpectedReply(format!("{} answered {}", command, reply))
}

/// Decode a SCAN reply: [next-cursor, [key, key, ...]]
fn decode_scan_page(reply: Reply) -> Result<ScanPage, DumpError> {
    let mut elements = reply
        .into_array()
        .ok_or_else(|| DumpError::UnexpectedReply("SCAN did not answer an array".to_string()))?;
    if elements.len() != 2 {
        return Err(DumpError::UnexpectedReply(format!(
            "SCAN answered {} elements instead of 2",
            elements.len()
        )));
    }

    let keys_reply = elements.pop().unwrap_or(Reply::Null);
    let cursor_reply = elements.pop().unwrap_or(Reply::Null);

    let cursor = cursor_reply
        .as_text()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| DumpError::UnexpectedReply("SCAN cursor is not a number".to_string()))?;

    let keys = decode_bulk_list("SCAN", keys_reply)?;

    Ok(ScanPage { cursor, keys })
}

/// Decode a TTL reply for `key`
///
/// -1 means no expiration, a non-negative value is the remaining seconds,
/// -2 means the key no longer exists.
fn decode_ttl(key: &Bytes, reply: Reply) -> Result<Ttl, DumpError> {
    match reply.as_integer() {
        Some(-2) => Err(DumpError::KeyVanished(key.clone())),
        Some(-1) => Ok(Ttl::None),
        Some(seconds) if seconds >= 0 => Ok(Ttl::Remaining(Duration::from_secs(seconds as u64))),
        _ => Err(unexpected("TTL", &reply)),
    }
}

/// Decode a TYPE reply for `key`
///
/// "none" means the key is already gone; any other unknown tag is a store
/// we do not understand.
fn decode_key_type(key: &Bytes, reply: Reply) -> Result<KeyType, DumpError> {
    let tag = reply
        .as_text()
        .ok_or_else(|| unexpected("TYPE", &reply))?;

    if tag == "none" {
        return Err(DumpError::KeyVanished(key.clone()));
    }

    KeyType::from_tag(tag)
        .ok_or_else(|| DumpError::UnexpectedReply(format!("TYPE answered unknown tag '{}'", tag)))
}

/// Decode an array-of-bulk-strings reply
fn decode_bulk_list(command: &str, reply: Reply) -> Result<Vec<Bytes>, DumpError> {
    let elements = reply
        .into_array()
        .ok_or_else(|| DumpError::UnexpectedReply(format!("{} did not answer an array", command)))?;

    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            Reply::Bulk(bytes) => out.push(bytes),
            other => return Err(unexpected(command, &other)),
        }
    }
    Ok(out)
}

/// Decode a ZRANGE ... WITHSCORES reply: a flat [member, score, ...] array
fn decode_scored_members(reply: Reply) -> Result<Vec<(Bytes, f64)>, DumpError> {
    let flat = decode_bulk_list("ZRANGE", reply)?;
    if flat.len() % 2 != 0 {
        return Err(DumpError::UnexpectedReply(
            "ZRANGE WITHSCORES answered an odd number of elements".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
        let score = std::str::from_utf8(&score)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| {
                DumpError::UnexpectedReply("ZRANGE score is not a number".to_string())
            })?;
        out.push((member, score));
    }
    Ok(out)
}

/// Decode an HGETALL reply: a flat [field, value, ...] array
fn decode_field_pairs(reply: Reply) -> Result<Vec<(Bytes, Bytes)>, DumpError> {
    let flat = decode_bulk_list("HGETALL", reply)?;
    if flat.len() % 2 != 0 {
        return Err(DumpError::UnexpectedReply(
            "HGETALL answered an odd number of elements".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        out.push((field, value));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Reply {
        Reply::Bulk(Bytes::from(s.to_string()))
    }

    #[test]
    fn test_decode_ttl_values() {
        let key = Bytes::from("k");

        assert_eq!(decode_ttl(&key, Reply::Integer(-1)).unwrap(), Ttl::None);
        assert_eq!(
            decode_ttl(&key, Reply::Integer(90)).unwrap(),
            Ttl::Remaining(Duration::from_secs(90))
        );
        assert_eq!(
            decode_ttl(&key, Reply::Integer(0)).unwrap(),
            Ttl::Remaining(Duration::from_secs(0))
        );

        // -2 is the store telling us the key is gone
        assert!(matches!(
            decode_ttl(&key, Reply::Integer(-2)),
            Err(DumpError::KeyVanished(_))
        ));

        assert!(matches!(
            decode_ttl(&key, bulk("oops")),
            Err(DumpError::UnexpectedReply(_))
        ));
    }

    #[test]
    fn test_decode_key_type() {
        let key = Bytes::from("k");

        assert_eq!(
            decode_key_type(&key, Reply::Simple("string".to_string())).unwrap(),
            KeyType::String
        );
        assert_eq!(
            decode_key_type(&key, Reply::Simple("zset".to_string())).unwrap(),
            KeyType::SortedSet
        );
        assert!(matches!(
            decode_key_type(&key, Reply::Simple("none".to_string())),
            Err(DumpError::KeyVanished(_))
        ));
        assert!(matches!(
            decode_key_type(&key, Reply::Simple("stream".to_string())),
            Err(DumpError::UnexpectedReply(_))
        ));
    }

    #[test]
    fn test_decode_scan_page() {
        let reply = Reply::Array(vec![
            bulk("42"),
            Reply::Array(vec![bulk("foo"), bulk("bar")]),
        ]);
        let page = decode_scan_page(reply).unwrap();
        assert_eq!(page.cursor, 42);
        assert_eq!(page.keys, vec![Bytes::from("foo"), Bytes::from("bar")]);
    }

    #[test]
    fn test_decode_scan_page_rejects_bad_shapes() {
        assert!(decode_scan_page(Reply::Integer(0)).is_err());
        assert!(decode_scan_page(Reply::Array(vec![bulk("0")])).is_err());
        assert!(decode_scan_page(Reply::Array(vec![
            bulk("abc"),
            Reply::Array(vec![]),
        ]))
        .is_err());
    }

    #[test]
    fn test_decode_scored_members() {
        let reply = Reply::Array(vec![bulk("alice"), bulk("1.5"), bulk("bob"), bulk("-3")]);
        let pairs = decode_scored_members(reply).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], (Bytes::from("alice"), 1.5));
        assert_eq!(pairs[1], (Bytes::from("bob"), -3.0));

        let odd = Reply::Array(vec![bulk("alice")]);
        assert!(decode_scored_members(odd).is_err());
    }

    #[test]
    fn test_decode_field_pairs() {
        let reply = Reply::Array(vec![bulk("name"), bulk("Alice"), bulk("age"), bulk("30")]);
        let pairs = decode_field_pairs(reply).unwrap();
        assert_eq!(
            pairs,
            vec![
                (Bytes::from("name"), Bytes::from("Alice")),
                (Bytes::from("age"), Bytes::from("30")),
            ]
        );
    }
}
