//! RESP2 reply parser and request encoder
//!
//! Parses server replies incrementally from a byte buffer and encodes
//! outgoing commands as arrays of bulk strings.

use super::types::{Reply, RespError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Encode a command as a RESP2 array of bulk strings into `buf`
///
/// Every client request has this shape; the server never receives any
/// other frame type from us.
pub fn encode_command(buf: &mut BytesMut, args: &[Bytes]) {
    buf.put_u8(b'*');
    buf.put_slice(args.len().to_string().as_bytes());
    buf.put_slice(CRLF);
    for arg in args {
        buf.put_u8(b'$');
        buf.put_slice(arg.len().to_string().as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(arg);
        buf.put_slice(CRLF);
    }
}

/// RESP2 reply parser
pub struct ReplyParser;

impl ReplyParser {
    /// Parse one reply from a buffer
    ///
    /// Returns Ok(Some(reply)) if a complete reply was parsed,
    /// Ok(None) if more data is needed,
    /// Err(e) if the stream is not valid RESP2
    pub fn parse(buf: &mut BytesMut) -> Result<Option<Reply>, RespError> {
        if buf.is_empty() {
            return Ok(None);
        }

        match buf[0] {
            b'+' => Self::parse_simple(buf),
            b'-' => Self::parse_error(buf),
            b':' => Self::parse_integer(buf),
            b'$' => Self::parse_bulk(buf),
            b'*' => Self::parse_array(buf),
            other => Err(RespError::InvalidProtocol(format!(
                "Unknown reply prefix: {}",
                other as char
            ))),
        }
    }

    /// Parse simple string: +OK\r\n
    fn parse_simple(buf: &mut BytesMut) -> Result<Option<Reply>, RespError> {
        match Self::read_line(buf)? {
            Some(line) => {
                let s = String::from_utf8(line[1..].to_vec()).map_err(|_| RespError::InvalidUtf8)?;
                Ok(Some(Reply::Simple(s)))
            }
            None => Ok(None),
        }
    }

    /// Parse error: -ERR message\r\n
    fn parse_error(buf: &mut BytesMut) -> Result<Option<Reply>, RespError> {
        match Self::read_line(buf)? {
            Some(line) => {
                let s = String::from_utf8(line[1..].to_vec()).map_err(|_| RespError::InvalidUtf8)?;
                Ok(Some(Reply::Error(s)))
            }
            None => Ok(None),
        }
    }

    /// Parse integer: :1000\r\n
    fn parse_integer(buf: &mut BytesMut) -> Result<Option<Reply>, RespError> {
        match Self::read_line(buf)? {
            Some(line) => Ok(Some(Reply::Integer(Self::parse_i64(&line[1..])?))),
            None => Ok(None),
        }
    }

    /// Parse bulk string: $6\r\nfoobar\r\n or $-1\r\n (null)
    fn parse_bulk(buf: &mut BytesMut) -> Result<Option<Reply>, RespError> {
        // First line carries the payload length
        let line = match Self::peek_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        let len = Self::parse_i64(&line[1..])?;
        if len == -1 {
            Self::read_line(buf)?; // consume the $-1 line
            return Ok(Some(Reply::Null));
        }
        if len < 0 {
            return Err(RespError::InvalidProtocol(format!(
                "Invalid bulk length: {}",
                len
            )));
        }

        // $len\r\n + payload + \r\n
        let total_len = line.len() + 2 + len as usize + 2;
        if buf.len() < total_len {
            return Ok(None);
        }

        Self::read_line(buf)?;
        let payload = buf.split_to(len as usize);

        if buf.len() < 2 || &buf[..2] != CRLF {
            return Err(RespError::InvalidProtocol(
                "Missing CRLF after bulk payload".to_string(),
            ));
        }
        buf.advance(2);

        Ok(Some(Reply::Bulk(payload.freeze())))
    }

    /// Parse array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    fn parse_array(buf: &mut BytesMut) -> Result<Option<Reply>, RespError> {
        let line = match Self::peek_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        let count = Self::parse_i64(&line[1..])?;
        if count == -1 {
            Self::read_line(buf)?; // consume the *-1 line
            return Ok(Some(Reply::Null));
        }
        if count < 0 {
            return Err(RespError::InvalidProtocol(format!(
                "Invalid array count: {}",
                count
            )));
        }

        // Parse the elements from a cloned buffer first: the real buffer must
        // only be consumed once the whole array is known to be present,
        // otherwise a partial read would leave trailing elements to be parsed
        // as standalone replies.
        let mut probe = buf.clone();
        Self::read_line(&mut probe)?;

        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match Self::parse(&mut probe)? {
                Some(reply) => elements.push(reply),
                None => return Ok(None),
            }
        }

        // All elements present, consume them from the real buffer
        Self::read_line(buf)?;
        for _ in 0..count {
            Self::parse(buf)?;
        }

        Ok(Some(Reply::Array(elements)))
    }

    /// Parse a signed decimal out of a frame payload
    fn parse_i64(bytes: &[u8]) -> Result<i64, RespError> {
        let s = std::str::from_utf8(bytes).map_err(|_| RespError::InvalidUtf8)?;
        s.parse::<i64>().map_err(|_| RespError::IntegerOverflow)
    }

    /// Read a line (without CRLF) and advance the buffer past it
    fn read_line(buf: &mut BytesMut) -> Result<Option<Vec<u8>>, RespError> {
        match Self::peek_line(buf)? {
            Some(line) => {
                buf.advance(line.len() + 2); // +2 for CRLF
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    /// Peek a line without advancing (returns line without CRLF)
    fn peek_line(buf: &BytesMut) -> Result<Option<Vec<u8>>, RespError> {
        if buf.len() < 2 {
            return Ok(None);
        }
        for i in 0..buf.len() - 1 {
            if &buf[i..i + 2] == CRLF {
                return Ok(Some(buf[..i].to_vec()));
            }
        }
        Ok(None)
    }
}
