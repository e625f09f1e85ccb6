//! Argument escaping for the reconstruction script
//!
//! Every key and value token placed on a command line goes through here;
//! this is the only defense against argument splitting when stored values
//! contain spaces, quotes or control bytes.

use bytes::{BufMut, Bytes, BytesMut};

/// Bytes that may appear in a bare (unquoted) token: ASCII letters,
/// digits, underscore, colon and hyphen. Process-wide immutable table,
/// built once at compile time.
static BARE_TOKEN_BYTES: [bool; 256] = bare_token_table();

const fn bare_token_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut i = 0;
    while i < 256 {
        let b = i as u8;
        table[i] = b.is_ascii_alphanumeric() || b == b'_' || b == b':' || b == b'-';
        i += 1;
    }
    table
}

/// Escape a raw token for embedding as a single script argument
///
/// Pure and total. Non-empty input made only of bare-token bytes is
/// returned unchanged. Anything else is single-quoted, with backslashes
/// doubled before quotes are escaped so the quote-escaping backslash is
/// never itself re-escaped. Empty input therefore always becomes `''`.
pub fn escape(raw: &Bytes) -> Bytes {
    if !raw.is_empty() && raw.iter().all(|&b| BARE_TOKEN_BYTES[b as usize]) {
        return raw.clone();
    }

    let mut out = BytesMut::with_capacity(raw.len() + 2);
    out.put_u8(b'\'');
    for &b in raw.iter() {
        match b {
            b'\\' => out.put_slice(b"\\\\"),
            b'\'' => out.put_slice(b"\\'"),
            _ => out.put_u8(b),
        }
    }
    out.put_u8(b'\'');
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(raw: &str) -> Bytes {
        escape(&Bytes::from(raw.to_string()))
    }

    #[test]
    fn test_bare_tokens_pass_through() {
        assert_eq!(escaped("foo"), Bytes::from("foo"));
        assert_eq!(escaped("user:42"), Bytes::from("user:42"));
        assert_eq!(escaped("a_b-c"), Bytes::from("a_b-c"));
        assert_eq!(escaped("ABC123"), Bytes::from("ABC123"));
    }

    #[test]
    fn test_bare_pass_through_is_idempotent() {
        let once = escaped("session:abc-1_x");
        assert_eq!(escape(&once), once);
    }

    #[test]
    fn test_spaces_force_quoting() {
        assert_eq!(escaped("hello world"), Bytes::from("'hello world'"));
    }

    #[test]
    fn test_quotes_and_backslashes() {
        assert_eq!(escaped("a'b\\c"), Bytes::from("'a\\'b\\\\c'"));
        assert_eq!(escaped("\\"), Bytes::from("'\\\\'"));
        assert_eq!(escaped("'"), Bytes::from("'\\''"));
        // A backslash right before a quote must not merge into one escape
        assert_eq!(escaped("\\'"), Bytes::from("'\\\\\\''"));
    }

    #[test]
    fn test_empty_is_quoted() {
        assert_eq!(escaped(""), Bytes::from("''"));
    }

    #[test]
    fn test_binary_input_is_quoted_verbatim() {
        let raw = Bytes::from_static(b"a\x00b\xff");
        assert_eq!(escape(&raw), Bytes::from_static(b"'a\x00b\xff'"));
    }
}
