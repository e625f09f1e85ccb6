//! Reconstruction command mapping
//!
//! Pure translation of one key snapshot (type + value + TTL) into the
//! ordered command lines that recreate it. No I/O happens here, so the
//! whole per-type policy is unit-testable without a live store.

use super::escape::escape;
use crate::client::{KeyType, Ttl};
use crate::error::DumpError;
use bytes::{BufMut, Bytes, BytesMut};

/// Ratio between a source TTL in milliseconds and the duration argument
/// the PSETEX reconstruction command carries.
const PSETEX_UNITS_PER_MS: u128 = 10_000;

/// Snapshot of one key's value, shaped by its stored type
#[derive(Debug, Clone, PartialEq)]
pub enum DumpValue {
    /// Scalar string
    Scalar(Bytes),
    /// Ordered sequence
    List(Vec<Bytes>),
    /// Unordered member set
    Set(Vec<Bytes>),
    /// Ordered (member, score) pairs
    SortedSet(Vec<(Bytes, f64)>),
    /// (field, value) pairs
    Hash(Vec<(Bytes, Bytes)>),
}

impl DumpValue {
    /// The stored type this snapshot came from
    pub fn kind(&self) -> KeyType {
        match self {
            DumpValue::Scalar(_) => KeyType::String,
            DumpValue::List(_) => KeyType::List,
            DumpValue::Set(_) => KeyType::Set,
            DumpValue::SortedSet(_) => KeyType::SortedSet,
            DumpValue::Hash(_) => KeyType::Hash,
        }
    }
}

/// Map one key snapshot to its reconstruction command lines, in replay order
///
/// Lines carry no trailing newline; the write shell appends it. Sorted sets
/// and hashes have no reconstruction strategy yet: non-empty ones are
/// refused with an explicit error, empty ones produce no lines at all.
pub fn commands_for(key: &Bytes, value: &DumpValue, ttl: &Ttl) -> Result<Vec<Bytes>, DumpError> {
    let mut lines = Vec::new();

    match value {
        DumpValue::Scalar(v) => match ttl {
            Ttl::Remaining(d) => {
                let units = d.as_millis() * PSETEX_UNITS_PER_MS;
                lines.push(line(&[
                    Bytes::from_static(b"PSETEX"),
                    escape(key),
                    Bytes::from(units.to_string()),
                    escape(v),
                ]));
            }
            Ttl::None => {
                lines.push(line(&[Bytes::from_static(b"SET"), escape(key), escape(v)]));
            }
        },

        DumpValue::List(items) => {
            lines.push(line(&[Bytes::from_static(b"DEL"), escape(key)]));
            if !items.is_empty() {
                let mut args = vec![Bytes::from_static(b"RPUSH"), escape(key)];
                args.extend(items.iter().map(escape));
                lines.push(line(&args));
                push_expire(&mut lines, key, ttl);
            }
        }

        DumpValue::Set(members) => {
            lines.push(line(&[Bytes::from_static(b"DEL"), escape(key)]));
            if !members.is_empty() {
                let mut args = vec![Bytes::from_static(b"SADD"), escape(key)];
                args.extend(members.iter().map(escape));
                lines.push(line(&args));
                push_expire(&mut lines, key, ttl);
            }
        }

        DumpValue::SortedSet(pairs) => {
            if !pairs.is_empty() {
                return Err(DumpError::UnsupportedType {
                    key: key.clone(),
                    kind: KeyType::SortedSet,
                });
            }
        }

        DumpValue::Hash(entries) => {
            if !entries.is_empty() {
                return Err(DumpError::UnsupportedType {
                    key: key.clone(),
                    kind: KeyType::Hash,
                });
            }
        }
    }

    Ok(lines)
}

/// Append an EXPIRE line when the key actually has a TTL
fn push_expire(lines: &mut Vec<Bytes>, key: &Bytes, ttl: &Ttl) {
    if let Ttl::Remaining(d) = ttl {
        lines.push(line(&[
            Bytes::from_static(b"EXPIRE"),
            escape(key),
            Bytes::from(d.as_secs().to_string()),
        ]));
    }
}

/// Join escaped tokens with single spaces into one command line
fn line(tokens: &[Bytes]) -> Bytes {
    let width = tokens.iter().map(|t| t.len() + 1).sum::<usize>();
    let mut out = BytesMut::with_capacity(width);
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.put_u8(b' ');
        }
        out.put_slice(token);
    }
    out.freeze()
}
