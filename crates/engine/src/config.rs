//! Engine configuration: level shapes and table geometry.

use anyhow::{ensure, Result};
use memtable::SkipListParams;
use sstable::TableOptions;

/// Compaction policy of one configured level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    /// Files may have overlapping key ranges; compaction consumes the whole
    /// level. Mandatory for level 0.
    Tiering,
    /// Files keep pairwise disjoint key ranges; compaction merges with the
    /// overlapping files of the next level.
    Leveling,
}

/// Capacity and policy of one configured level.
#[derive(Debug, Clone, Copy)]
pub struct LevelConfig {
    pub max_files: usize,
    pub kind: LevelKind,
}

/// Build-time configuration of an [`Engine`](crate::Engine).
///
/// `levels` describes levels `0..k`; one more level, the terminal level `k`,
/// is implicit and has unlimited capacity. Level configurations are fixed at
/// construction.
#[derive(Debug, Clone)]
pub struct Options {
    pub levels: Vec<LevelConfig>,
    /// Per-SST byte cap.
    pub max_file_size: u32,
    /// Bloom filter width in bits, shared by every file of the store.
    pub bloom_bits: u64,
    /// Bloom hash count.
    pub bloom_hashes: u32,
    pub skiplist: SkipListParams,
    /// Capacity of the pooled read handles.
    pub stream_cache_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            levels: vec![
                LevelConfig { max_files: 2, kind: LevelKind::Tiering },
                LevelConfig { max_files: 4, kind: LevelKind::Leveling },
                LevelConfig { max_files: 8, kind: LevelKind::Leveling },
                LevelConfig { max_files: 16, kind: LevelKind::Leveling },
                LevelConfig { max_files: 32, kind: LevelKind::Leveling },
            ],
            max_file_size: 2 * 1024 * 1024,
            bloom_bits: 10240 * 8,
            bloom_hashes: 3,
            skiplist: SkipListParams::default(),
            stream_cache_capacity: 32,
        }
    }
}

impl Options {
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(first) = self.levels.first() {
            ensure!(
                first.kind == LevelKind::Tiering,
                "level 0 must use the tiering policy"
            );
        }
        for (level, config) in self.levels.iter().enumerate() {
            ensure!(
                config.max_files >= 1,
                "level {} must allow at least one file",
                level
            );
        }
        ensure!(self.max_file_size > 0, "max_file_size must be > 0");
        ensure!(self.bloom_bits > 0, "bloom_bits must be > 0");
        ensure!(self.bloom_hashes > 0, "bloom_hashes must be > 0");
        ensure!(
            self.stream_cache_capacity >= 1,
            "stream_cache_capacity must be >= 1"
        );
        Ok(())
    }

    pub(crate) fn table_options(&self) -> TableOptions {
        TableOptions {
            max_file_size: self.max_file_size,
            bloom_bits: self.bloom_bits,
            bloom_hashes: self.bloom_hashes,
        }
    }
}
