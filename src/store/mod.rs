//! Persistence of generated segment sets.
//!
//! A set is always replaced whole: readers observe either the previous set for
//! a key or the new one, never a mix and never a partial write.

mod csv_files;
mod memory;

pub use csv_files::CsvStore;
pub use memory::MemoryStore;

use anyhow::Result;

use crate::model::{Segment, SegmentKey};

#[async_trait::async_trait]
pub trait SegmentStore: Send + Sync {
    /// Atomically replaces every segment stored under `key` with `segments`.
    async fn replace(&self, key: &SegmentKey, segments: Vec<Segment>) -> Result<()>;

    /// Returns the current set for `key`, ordered by origin then destination index.
    async fn segments(&self, key: &SegmentKey) -> Result<Vec<Segment>>;

    /// Lists every key that has a stored set, in key order.
    async fn keys(&self) -> Result<Vec<SegmentKey>>;
}

pub(crate) fn sort_segments(segments: &mut [Segment]) {
    segments.sort_by_key(|s| (s.origin.index, s.destination.index));
}
