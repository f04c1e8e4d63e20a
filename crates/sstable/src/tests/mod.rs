use std::path::Path;
use std::rc::Rc;

use crate::format::{Key, KeyOffset, TableOptions};
use crate::fs::FileSystem;
use crate::table::{BufferTable, FileTable, KeyIndex};

mod appender_tests;
mod table_tests;

/// Tiny geometry so spill paths trigger with a handful of records:
/// header = 4 + 16 + 128 = 148, empty file = 156 bytes, 12-byte records.
pub fn small_opts() -> TableOptions {
    TableOptions {
        max_file_size: 256,
        bloom_bits: 1024,
        bloom_hashes: 3,
    }
}

pub fn open_fs(dir: &Path, levels: u32, stream_capacity: usize) -> Rc<FileSystem> {
    Rc::new(FileSystem::new(dir, levels, stream_capacity).unwrap())
}

/// `(key, Some(bytes))` for a value, `(key, None)` for a tombstone; keys must
/// be ascending.
pub fn encode_entries(entries: &[(Key, Option<&[u8]>)]) -> (Vec<KeyOffset>, Vec<u8>) {
    let mut records = Vec::new();
    let mut values = Vec::new();
    for (key, value) in entries {
        records.push(KeyOffset::new(*key, values.len() as u32, value.is_none()));
        if let Some(bytes) = value {
            values.extend_from_slice(bytes);
        }
    }
    (records, values)
}

pub fn buffer_from(entries: &[(Key, Option<&[u8]>)]) -> BufferTable {
    let (records, values) = encode_entries(entries);
    BufferTable::new(KeyIndex::new(records), values)
}

pub fn write_file(
    fs: &Rc<FileSystem>,
    opts: &TableOptions,
    level: u32,
    entries: &[(Key, Option<&[u8]>)],
) -> FileTable {
    let (records, values) = encode_entries(entries);
    FileTable::create(
        fs,
        opts,
        level,
        KeyIndex::new(records),
        values.len() as u32,
        |out| {
            use std::io::Write;
            out.write_all(&values)?;
            Ok(())
        },
    )
    .unwrap()
}
