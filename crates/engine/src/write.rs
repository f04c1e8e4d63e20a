//! Write path: `put()`, `delete()`, and the flush that backs them.
//!
//! Every mutation first tries an in-place update of the memtable, whose size
//! projection guards the per-file cap. A refused update flushes the current
//! memtable (to a fresh level-0 SST while level 0 has room, otherwise as a
//! buffer table handed to compaction) and then re-applies.

use anyhow::{bail, Result};
use log::debug;
use sstable::{BufferTable, FileTable, Key, KeyIndex, KeyOffset, TableIterator, ValueCodec};

use crate::Engine;

impl<C: ValueCodec> Engine<C> {
    /// Inserts or updates `key`.
    ///
    /// May trigger a flush and, when level 0 is at capacity, an inline
    /// compaction cascade; the call returns once all of it completed.
    pub fn put(&mut self, key: Key, value: &C::Value) -> Result<()> {
        let encoded = C::encode(value)?;
        if let Err(pending) = self.mem.put(key, encoded) {
            debug!(
                "memtable at {} bytes cannot take key {}, flushing",
                self.mem.projected_file_size(),
                key
            );
            self.flush_memtable()?;
            if self.mem.put(key, pending).is_err() {
                bail!("memtable rejected an entry right after a flush");
            }
        }
        Ok(())
    }

    /// Deletes `key`, returning whether a live key was actually deleted.
    ///
    /// The current state is consulted first: a key that is absent everywhere
    /// or already tombstoned returns `false` and changes nothing. Otherwise a
    /// tombstone is staged (possibly flushing, like `put`).
    pub fn delete(&mut self, key: Key) -> Result<bool> {
        match self.mem.get(key) {
            Some(value) if value.is_tombstone() => return Ok(false),
            Some(_) => {}
            None => {
                if !self.key_live_on_disk(key) {
                    return Ok(false);
                }
            }
        }

        if !self.mem.delete(key) {
            self.flush_memtable()?;
            if !self.mem.delete(key) {
                bail!("memtable rejected a tombstone right after a flush");
            }
        }
        Ok(true)
    }

    /// Whether the freshest on-disk version of `key` is a live value.
    fn key_live_on_disk(&self, key: Key) -> bool {
        for level_vec in &self.levels {
            for table in level_vec.iter().rev() {
                if let Some(it) = table.find(key) {
                    return !it.is_tombstone();
                }
            }
        }
        false
    }

    /// Materializes the memtable and clears it.
    ///
    /// Destination policy: a new level-0 SST while level 0 has spare room,
    /// otherwise a buffer table that seeds the compaction pipeline.
    pub(crate) fn flush_memtable(&mut self) -> Result<()> {
        if self.mem.is_empty() {
            return Ok(());
        }
        if self.level0_has_room() {
            debug!(
                "flushing {} entries to a level-0 file",
                self.mem.len()
            );
            let table = self.pop_file(0)?;
            self.levels[0].push(table);
        } else {
            debug!(
                "level 0 full, flushing {} entries through compaction",
                self.mem.len()
            );
            let buffer = self.pop_buffer();
            self.compact(0, vec![buffer])?;
        }
        self.mem.clear();
        Ok(())
    }

    /// The memtable as a buffer table: packed index plus value blob.
    fn pop_buffer(&self) -> BufferTable {
        let mut records = Vec::with_capacity(self.mem.len());
        let mut values = Vec::with_capacity(self.mem.value_bytes_len() as usize);
        self.mem.for_each(|key, value| {
            records.push(KeyOffset::new(
                key,
                values.len() as u32,
                value.is_tombstone(),
            ));
            if let Some(bytes) = value.as_bytes() {
                values.extend_from_slice(bytes);
            }
        });
        BufferTable::new(KeyIndex::new(records), values)
    }

    /// The memtable written straight to an SST in `level`.
    fn pop_file(&self, level: u32) -> Result<FileTable> {
        let mut records = Vec::with_capacity(self.mem.len());
        let mut offset = 0u32;
        self.mem.for_each(|key, value| {
            records.push(KeyOffset::new(key, offset, value.is_tombstone()));
            offset += value.encoded_len();
        });

        let mem = &self.mem;
        let table = FileTable::create(
            &self.fs,
            &self.table_opts,
            level,
            KeyIndex::new(records),
            self.mem.value_bytes_len(),
            |out| {
                use std::io::Write;
                let mut write_result = Ok(());
                mem.for_each(|_, value| {
                    if write_result.is_ok() {
                        if let Some(bytes) = value.as_bytes() {
                            if let Err(e) = out.write_all(bytes) {
                                write_result = Err(e.into());
                            }
                        }
                    }
                });
                write_result
            },
        )?;
        Ok(table)
    }
}
