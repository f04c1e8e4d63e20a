use crate::{Engine, LevelConfig, LevelKind, Options};
use memtable::SkipListParams;
use std::fs;
use std::path::Path;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Tiny store: 128-byte bloom (156-byte file prefix), 512-byte files, two
/// tiering slots at level 0, two leveling slots at level 1, terminal level 2.
/// A 100-byte value costs 112 projected bytes, so three fit per file and the
/// fourth put flushes.
pub fn tiny_options() -> Options {
    Options {
        levels: vec![
            LevelConfig {
                max_files: 2,
                kind: LevelKind::Tiering,
            },
            LevelConfig {
                max_files: 2,
                kind: LevelKind::Leveling,
            },
        ],
        max_file_size: 512,
        bloom_bits: 1024,
        bloom_hashes: 3,
        skiplist: SkipListParams::default(),
        stream_cache_capacity: 4,
    }
}

/// Deeper shape for volume scenarios, with a configurable file cap.
pub fn scenario_options(max_file_size: u32) -> Options {
    Options {
        levels: vec![
            LevelConfig {
                max_files: 2,
                kind: LevelKind::Tiering,
            },
            LevelConfig {
                max_files: 2,
                kind: LevelKind::Leveling,
            },
            LevelConfig {
                max_files: 4,
                kind: LevelKind::Leveling,
            },
        ],
        max_file_size,
        bloom_bits: 1024,
        bloom_hashes: 3,
        skiplist: SkipListParams::default(),
        stream_cache_capacity: 4,
    }
}

pub fn open_tiny(dir: &Path) -> Engine {
    Engine::open(dir, tiny_options()).unwrap()
}

pub fn value(len: usize, fill: u8) -> Vec<u8> {
    vec![fill; len]
}

pub fn count_sst_files(root: &Path) -> usize {
    let mut count = 0;
    for entry in fs::read_dir(root).unwrap().filter_map(|e| e.ok()) {
        if !entry.path().is_dir() {
            continue;
        }
        count += fs::read_dir(entry.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|s| s.to_str())
                    .map(|ext| ext == "sst")
                    .unwrap_or(false)
            })
            .count();
    }
    count
}

/// Every SST on disk stays within the configured cap.
pub fn assert_files_within_cap(root: &Path, cap: u32) {
    for entry in fs::read_dir(root).unwrap().filter_map(|e| e.ok()) {
        if !entry.path().is_dir() {
            continue;
        }
        for file in fs::read_dir(entry.path()).unwrap().filter_map(|e| e.ok()) {
            if file.path().extension().map_or(false, |e| e == "sst") {
                let len = fs::metadata(file.path()).unwrap().len();
                assert!(
                    len <= cap as u64,
                    "{:?} is {} bytes, over the {}-byte cap",
                    file.path(),
                    len,
                    cap
                );
            }
        }
    }
}

/// Key ranges within `level` are pairwise disjoint.
pub fn assert_level_disjoint(engine: &Engine, level: usize) {
    let mut ranges: Vec<(u64, u64)> = engine
        .level_tables(level)
        .iter()
        .map(|t| (t.min_key(), t.max_key()))
        .collect();
    ranges.sort();
    for pair in ranges.windows(2) {
        assert!(
            pair[0].1 < pair[1].0,
            "level {} ranges overlap: {:?} and {:?}",
            level,
            pair[0],
            pair[1]
        );
    }
}
