//! # Engine - LSM-tree storage engine
//!
//! The central orchestrator that ties together the [`memtable`] and
//! [`sstable`] crates into a complete embedded key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────────┐
//! │                      ENGINE                          │
//! │                                                      │
//! │ write.rs → memtable insert (exact size projection)   │
//! │              |                                       │
//! │              |  (projection would exceed file cap?)  │
//! │              |            yes                        │
//! │              v                                       │
//! │     level 0 has room ── yes ──► new level-0 SST      │
//! │              |                                       │
//! │              no                                      │
//! │              v                                       │
//! │     compaction.rs → merge into deeper levels         │
//! │                                                      │
//! │ read.rs → memtable → level 0 → level 1 → ...         │
//! │            (first hit wins, newest file first)       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                             |
//! |----------------|-----------------------------------------------------|
//! | `lib.rs`       | `Engine` struct, bootstrap, accessors, `Debug`, `Drop` |
//! | [`config`]     | Level shapes, table geometry, validation            |
//! | `write.rs`     | `put()`, `delete()`, the flush decision             |
//! | `read.rs`      | `get()`, `scan()`                                   |
//! | `compaction.rs`| The level pipeline with overlap absorption          |
//!
//! ## Durability
//!
//! There is no write-ahead log and no manifest: the durable state is exactly
//! the set of completed SSTs under `level-<N>` directories. Dropping the
//! engine flushes a non-empty memtable; anything staged in memory is lost on
//! a crash. Bootstrap re-reads the directory tree and resumes the timestamp
//! counter past the largest value observed.

mod compaction;
mod config;
mod read;
mod write;

pub use config::{LevelConfig, LevelKind, Options};
pub use sstable::{Key, RawBytes, Utf8, ValueCodec};

use anyhow::Result;
use log::info;
use memtable::Memtable;
use sstable::{FileSystem, FileTable, TableOptions, RECORD_BYTES};
use std::marker::PhantomData;
use std::path::Path;
use std::rc::Rc;

/// The storage engine: a memtable, the per-level file lists, and the shared
/// file-system manager.
///
/// Single-threaded and synchronous; flushes and compactions run inline on
/// the `put`/`delete` that triggered them. The codec parameter `C` maps the
/// caller's value type to the opaque bytes the tables store; [`RawBytes`]
/// (the default) stores `Vec<u8>` as-is.
pub struct Engine<C: ValueCodec = RawBytes> {
    mem: Memtable<Key>,
    /// `levels[n]` holds level `n`'s files ordered oldest to newest; the
    /// last entry is the unbounded terminal level.
    levels: Vec<Vec<FileTable>>,
    fs: Rc<FileSystem>,
    opts: Options,
    table_opts: TableOptions,
    _codec: PhantomData<C>,
}

impl<C: ValueCodec> Engine<C> {
    /// Opens (or creates) a store in `directory`.
    ///
    /// Bootstrap creates the level skeleton, loads the key section of every
    /// `*.sst` found in it, sorts each level by timestamp, and advances the
    /// timestamp counter past the maximum observed.
    ///
    /// # Errors
    ///
    /// Fails on invalid options, I/O errors, or a corrupt file (a file whose
    /// key section cannot be parsed; recovery requires human intervention).
    pub fn open<P: AsRef<Path>>(directory: P, opts: Options) -> Result<Self> {
        opts.validate()?;
        let table_opts = opts.table_options();
        let configured = opts.levels.len();

        let fs = Rc::new(FileSystem::new(
            directory.as_ref(),
            configured as u32,
            opts.stream_cache_capacity,
        )?);

        let mut levels: Vec<Vec<FileTable>> = (0..=configured).map(|_| Vec::new()).collect();
        fs.for_each_file(|path, level| {
            let table = FileTable::open(&fs, &table_opts, path, level)?;
            levels[level as usize].push(table);
            Ok(())
        })?;
        // Newest-to-oldest reads rely on timestamp order, not on the order
        // the directory iterator happened to return names in.
        for level_vec in &mut levels {
            level_vec.sort_by_key(FileTable::timestamp);
        }

        let file_count: usize = levels.iter().map(Vec::len).sum();
        info!(
            "opened store at {:?}: {} files across {} levels, next timestamp {}",
            directory.as_ref(),
            file_count,
            levels.len(),
            fs.timestamp()
        );

        let mem = Memtable::new(
            opts.skiplist,
            table_opts.initial_file_size(),
            RECORD_BYTES,
            table_opts.max_file_size,
        );

        Ok(Self {
            mem,
            levels,
            fs,
            opts,
            table_opts,
            _codec: PhantomData,
        })
    }

    /// Clears the memtable and every level, purges the data directory, and
    /// recreates the skeleton. The timestamp counter restarts at zero.
    pub fn reset(&mut self) -> Result<()> {
        self.mem.clear();
        for level_vec in &mut self.levels {
            level_vec.clear();
        }
        self.fs.reset()?;
        info!("store reset");
        Ok(())
    }

    /// Number of levels including the terminal one.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of files currently in `level`.
    #[must_use]
    pub fn level_len(&self, level: usize) -> usize {
        self.levels[level].len()
    }

    /// The files of `level`, oldest first.
    #[must_use]
    pub fn level_tables(&self, level: usize) -> &[FileTable] {
        &self.levels[level]
    }

    /// Total SST count across all levels.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Number of entries staged in the memtable (tombstones included).
    #[must_use]
    pub fn memtable_len(&self) -> usize {
        self.mem.len()
    }

    fn level0_has_room(&self) -> bool {
        match self.opts.levels.first() {
            Some(config) => self.levels[0].len() < config.max_files,
            // No configured levels: everything lives in the terminal level 0.
            None => true,
        }
    }
}

impl<C: ValueCodec> std::fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let per_level: Vec<usize> = self.levels.iter().map(Vec::len).collect();
        f.debug_struct("Engine")
            .field("memtable_entries", &self.mem.len())
            .field("memtable_projected_bytes", &self.mem.projected_file_size())
            .field("files_per_level", &per_level)
            .field("next_timestamp", &self.fs.timestamp())
            .finish()
    }
}

/// Best-effort flush on drop.
///
/// A non-empty memtable is persisted the same way an overflowing write would
/// persist it, so no acknowledged data is lost across a clean shutdown.
/// Errors are ignored because `Drop` cannot propagate them.
impl<C: ValueCodec> Drop for Engine<C> {
    fn drop(&mut self) {
        if !self.mem.is_empty() {
            let _ = self.flush_memtable();
        }
    }
}

#[cfg(test)]
mod tests;
