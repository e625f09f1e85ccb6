//! Key-space scan and per-key resolution
//!
//! Drives the cursor-paged SCAN loop, resolves each enumerated key to its
//! type, value and TTL, and streams the resulting command lines to the
//! sink as they are produced. Nothing is buffered across keys.

use super::command::{commands_for, DumpValue};
use crate::client::{KeyType, StoreClient, Ttl};
use crate::error::DumpError;
use bytes::Bytes;
use std::io::Write;
use tracing::debug;

/// Default number of keys requested per scan page
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Scan every key matching `pattern` and write its reconstruction
/// commands to `out`
///
/// The scan is sequential and not restartable: the first error from a
/// page fetch, a key resolution or the sink aborts the whole run. The
/// store gives no snapshot isolation, so keys mutated concurrently can
/// yield a vanished-key error rather than a consistent dump.
pub async fn scan_keys<C, W>(
    client: &mut C,
    pattern: &str,
    page_size: u64,
    out: &mut W,
) -> Result<(), DumpError>
where
    C: StoreClient,
    W: Write,
{
    let mut cursor = 0u64;

    loop {
        let page = client.scan_page(cursor, pattern, page_size).await?;
        debug!("Scan page: {} keys, next cursor {}", page.keys.len(), page.cursor);
        cursor = page.cursor;

        for key in page.keys {
            let (value, ttl) = resolve(client, &key).await?;
            for line in commands_for(&key, &value, &ttl)? {
                out.write_all(&line)?;
                out.write_all(b"\n")?;
            }
        }

        if cursor == 0 {
            break;
        }
    }

    Ok(())
}

/// Resolve one key to its value snapshot and remaining TTL
///
/// Fetch order is TTL, then type, then the type-specific full read; any
/// of the three failing aborts with that error.
pub async fn resolve<C: StoreClient>(
    client: &mut C,
    key: &Bytes,
) -> Result<(DumpValue, Ttl), DumpError> {
    let ttl = client.ttl(key).await?;
    let kind = client.key_type(key).await?;

    let value = match kind {
        KeyType::String => DumpValue::Scalar(client.get(key).await?),
        KeyType::List => DumpValue::List(client.list_range(key).await?),
        KeyType::Set => DumpValue::Set(client.set_members(key).await?),
        KeyType::SortedSet => DumpValue::SortedSet(client.sorted_set_range(key).await?),
        KeyType::Hash => DumpValue::Hash(client.hash_entries(key).await?),
    };

    Ok((value, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScanPage;
    use async_trait::async_trait;
    use std::io;
    use std::time::Duration;
    use tokio_test::block_on;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    /// In-memory stand-in for a live store
    struct FakeStore {
        entries: Vec<(Bytes, DumpValue, Ttl)>,
        page_size_seen: u64,
        pages_served: usize,
        fail_pages: bool,
    }

    impl FakeStore {
        fn new(entries: Vec<(Bytes, DumpValue, Ttl)>) -> Self {
            FakeStore {
                entries,
                page_size_seen: 0,
                pages_served: 0,
                fail_pages: false,
            }
        }

        fn lookup(&self, key: &Bytes) -> Result<&(Bytes, DumpValue, Ttl), DumpError> {
            self.entries
                .iter()
                .find(|(k, _, _)| k == key)
                .ok_or_else(|| DumpError::KeyVanished(key.clone()))
        }
    }

    #[async_trait]
    impl StoreClient for FakeStore {
        async fn scan_page(
            &mut self,
            cursor: u64,
            _pattern: &str,
            count: u64,
        ) -> Result<ScanPage, DumpError> {
            if self.fail_pages {
                return Err(DumpError::Server("LOADING".to_string()));
            }
            self.page_size_seen = count;
            self.pages_served += 1;

            let start = cursor as usize;
            let end = (start + count as usize).min(self.entries.len());
            let keys = self.entries[start..end]
                .iter()
                .map(|(k, _, _)| k.clone())
                .collect();
            let cursor = if end == self.entries.len() { 0 } else { end as u64 };
            Ok(ScanPage { cursor, keys })
        }

        async fn ttl(&mut self, key: &Bytes) -> Result<Ttl, DumpError> {
            Ok(self.lookup(key)?.2)
        }

        async fn key_type(&mut self, key: &Bytes) -> Result<KeyType, DumpError> {
            Ok(self.lookup(key)?.1.kind())
        }

        async fn get(&mut self, key: &Bytes) -> Result<Bytes, DumpError> {
            match &self.lookup(key)?.1 {
                DumpValue::Scalar(v) => Ok(v.clone()),
                _ => unreachable!("resolver asked GET for a non-string key"),
            }
        }

        async fn list_range(&mut self, key: &Bytes) -> Result<Vec<Bytes>, DumpError> {
            match &self.lookup(key)?.1 {
                DumpValue::List(items) => Ok(items.clone()),
                _ => unreachable!("resolver asked LRANGE for a non-list key"),
            }
        }

        async fn set_members(&mut self, key: &Bytes) -> Result<Vec<Bytes>, DumpError> {
            match &self.lookup(key)?.1 {
                DumpValue::Set(members) => Ok(members.clone()),
                _ => unreachable!("resolver asked SMEMBERS for a non-set key"),
            }
        }

        async fn sorted_set_range(&mut self, key: &Bytes) -> Result<Vec<(Bytes, f64)>, DumpError> {
            match &self.lookup(key)?.1 {
                DumpValue::SortedSet(pairs) => Ok(pairs.clone()),
                _ => unreachable!("resolver asked ZRANGE for a non-zset key"),
            }
        }

        async fn hash_entries(&mut self, key: &Bytes) -> Result<Vec<(Bytes, Bytes)>, DumpError> {
            match &self.lookup(key)?.1 {
                DumpValue::Hash(entries) => Ok(entries.clone()),
                _ => unreachable!("resolver asked HGETALL for a non-hash key"),
            }
        }
    }

    fn dump(store: &mut FakeStore, page_size: u64) -> Result<String, DumpError> {
        let mut out = Vec::new();
        block_on(scan_keys(store, "*", page_size, &mut out))?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_mixed_keyspace_dump() {
        let mut store = FakeStore::new(vec![
            (b("foo"), DumpValue::Scalar(b("bar")), Ttl::None),
            (
                b("cached"),
                DumpValue::Scalar(b("v")),
                Ttl::Remaining(Duration::from_secs(5)),
            ),
            (
                b("mylist"),
                DumpValue::List(vec![b("a"), b("b")]),
                Ttl::Remaining(Duration::from_secs(60)),
            ),
            (b("tags"), DumpValue::Set(vec![b("red")]), Ttl::None),
            (b("empty"), DumpValue::List(vec![]), Ttl::None),
        ]);

        let script = dump(&mut store, 1000).unwrap();
        assert_eq!(
            script,
            "SET foo bar\n\
             PSETEX cached 50000000 v\n\
             DEL mylist\n\
             RPUSH mylist a b\n\
             EXPIRE mylist 60\n\
             DEL tags\n\
             SADD tags red\n\
             DEL empty\n"
        );
    }

    #[test]
    fn test_cursor_termination_and_page_count() {
        let entries: Vec<_> = (0..10)
            .map(|i| (b(&format!("k{}", i)), DumpValue::Scalar(b("v")), Ttl::None))
            .collect();
        let mut store = FakeStore::new(entries);

        let script = dump(&mut store, 3).unwrap();

        // ceil(10 / 3) pages, every key visited exactly once
        assert_eq!(store.pages_served, 4);
        assert_eq!(store.page_size_seen, 3);
        assert_eq!(script.lines().count(), 10);
        for i in 0..10 {
            assert_eq!(
                script.lines().filter(|l| *l == format!("SET k{} v", i)).count(),
                1
            );
        }
    }

    #[test]
    fn test_empty_keyspace_terminates_immediately() {
        let mut store = FakeStore::new(vec![]);
        let script = dump(&mut store, 1000).unwrap();
        assert_eq!(script, "");
        assert_eq!(store.pages_served, 1);
    }

    #[test]
    fn test_page_fetch_error_aborts() {
        let mut store = FakeStore::new(vec![(b("foo"), DumpValue::Scalar(b("v")), Ttl::None)]);
        store.fail_pages = true;
        assert!(matches!(dump(&mut store, 1000), Err(DumpError::Server(_))));
    }

    #[test]
    fn test_unsupported_key_aborts_mid_stream() {
        let mut store = FakeStore::new(vec![
            (b("foo"), DumpValue::Scalar(b("bar")), Ttl::None),
            (b("ranks"), DumpValue::SortedSet(vec![(b("m"), 2.0)]), Ttl::None),
            (b("after"), DumpValue::Scalar(b("x")), Ttl::None),
        ]);

        let mut out = Vec::new();
        let err = block_on(scan_keys(&mut store, "*", 1000, &mut out)).unwrap_err();
        assert!(matches!(err, DumpError::UnsupportedType { .. }));

        // Everything before the faulting key was already streamed
        assert_eq!(String::from_utf8(out).unwrap(), "SET foo bar\n");
    }

    #[test]
    fn test_resolve_fetches_by_type() {
        let mut store = FakeStore::new(vec![(
            b("mylist"),
            DumpValue::List(vec![b("a")]),
            Ttl::Remaining(Duration::from_secs(3)),
        )]);

        let (value, ttl) = block_on(resolve(&mut store, &b("mylist"))).unwrap();
        assert_eq!(value, DumpValue::List(vec![b("a")]));
        assert_eq!(ttl, Ttl::Remaining(Duration::from_secs(3)));
    }

    #[test]
    fn test_vanished_key_aborts() {
        let mut store = FakeStore::new(vec![(b("gone"), DumpValue::Scalar(b("v")), Ttl::None)]);
        // The scan enumerated a key the resolver can no longer find
        let err = block_on(resolve(&mut store, &b("other"))).unwrap_err();
        assert!(matches!(err, DumpError::KeyVanished(_)));
    }

    #[test]
    fn test_sink_error_aborts() {
        struct FailingSink;
        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut store = FakeStore::new(vec![(b("foo"), DumpValue::Scalar(b("v")), Ttl::None)]);
        let err = block_on(scan_keys(&mut store, "*", 1000, &mut FailingSink)).unwrap_err();
        assert!(matches!(err, DumpError::Io(_)));
    }
}
