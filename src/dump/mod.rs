//! Dump module
//!
//! The scan-and-serialize pipeline: paginated key enumeration, per-type
//! value extraction, type-to-command mapping and literal-safe escaping.
//! The pipeline only reads; the store is never mutated.

mod command;
mod escape;
mod scan;

pub use command::{commands_for, DumpValue};
pub use escape::escape;
pub use scan::{resolve, scan_keys, DEFAULT_PAGE_SIZE};

use crate::client::StoreClient;
use crate::error::DumpError;
use std::io::Write;

/// Export every key matching `pattern` as a reconstruction script on `out`
///
/// Drives the scan to completion over an already-connected client and
/// stops at the first propagated failure; there is no partial-completion
/// reporting and no continuation past the first fault.
pub async fn export<C, W>(client: &mut C, pattern: &str, out: &mut W) -> Result<(), DumpError>
where
    C: StoreClient,
    W: Write,
{
    scan_keys(client, pattern, DEFAULT_PAGE_SIZE, out).await
}
