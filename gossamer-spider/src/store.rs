use crate::error::Result;
use crate::walk::UrlRecord;
use std::path::PathBuf;

/// Where cleaned page artifacts land, keyed by the deterministic storage
/// key of their URL. `put` is write-once: putting to an existing key leaves
/// the stored artifact untouched and reports where it already lives. That
/// is what makes the archiver's resumability check sound.
pub trait ArtifactStore: Send + Sync {
    fn contains(&self, key: &str) -> bool;
    fn put(&self, key: &str, contents: &str) -> Result<PathBuf>;
}

/// Receives the full set of accumulated traversal records once a walk
/// completes. Callers wanting intermediate-depth results read them back
/// from here, not from the walker's return value.
pub trait RecordSink {
    fn persist_records(&self, records: &[UrlRecord]) -> Result<()>;
}
