//! # SST - sorted string tables and their machinery
//!
//! Immutable, on-disk storage files for the storage engine, plus the pieces
//! that produce and consume them: the value codec, the per-level file-system
//! manager with its LRU of open read handles, the in-memory buffer table, the
//! freshness-aware iterator heap, and the spill-at-capacity appender.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ timestamp (u64)          assigned at creation, monotonic      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ KEY SECTION                                                   │
//! │                                                               │
//! │ count (u32) | min_key (u64) | max_key (u64)                   │
//! │ bloom bits (ceil(M/8) bytes, M fixed by configuration)        │
//! │ count × [ key (u64) | packed_offset (u32) ]                   │
//! │                                                               │
//! │ packed_offset bit 31 = tombstone, bits 0..31 = value offset   │
//! ├───────────────────────────────────────────────────────────────┤
//! │ VALUE SECTION (concatenated encoded values)                   │
//! │                                                               │
//! │ record i spans [offset_i, offset_{i+1}), the last record      │
//! │ runs to end of file; a tombstone spans zero bytes             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. There is no footer and no per-record
//! checksum: the key section is eagerly parsed on open and validated against
//! the file length, and values are read on demand through the stream cache.
//!
//! Files are write-once. A new SST becomes visible only after its writer
//! completed successfully, and compaction unlinks consumed inputs only after
//! their replacements are fully written.

mod appender;
mod codec;
mod format;
mod fs;
mod lru;
mod merge;
mod table;

pub use appender::Appender;
pub use codec::{RawBytes, Utf8, ValueCodec};
pub use format::{Key, KeyOffset, TableOptions, RECORD_BYTES, TIMESTAMP_BYTES};
pub use fs::FileSystem;
pub use lru::LruCache;
pub use merge::{merge_tables, IteratorHeap};
pub use table::{BufferTable, BufferTableIter, FileTable, FileTableIter, KeyIndex, TableIterator};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the SST layer.
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error; never retried.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A file whose key section cannot be parsed or whose size is
    /// inconsistent with its index. The file is unusable; recovery requires
    /// human intervention.
    #[error("corrupt sstable {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
