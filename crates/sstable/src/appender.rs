//! Streaming output writer with spill-at-capacity.
//!
//! The appender accumulates key-offset records and concatenated value bytes
//! while tracking the exact size of the file it would produce (the same
//! formula the memtable uses). An append that would push past the cap first
//! pops the accumulated content as a finished table, then seeds the next one
//! with the triggering record. Every produced table holds at least one
//! record, and only a single oversized record can push a table past the cap.

use std::rc::Rc;

use crate::format::{KeyOffset, TableOptions, RECORD_BYTES};
use crate::fs::FileSystem;
use crate::table::{BufferTable, FileTable, KeyIndex, TableIterator};
use crate::Result;

pub struct Appender {
    opts: TableOptions,
    records: Vec<KeyOffset>,
    values: Vec<u8>,
    /// Projected size of the file the current content would produce.
    file_size: u32,
}

impl Appender {
    pub fn new(opts: TableOptions) -> Self {
        Self {
            opts,
            records: Vec::new(),
            values: Vec::new(),
            file_size: opts.initial_file_size(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends the record under `it`, spilling the accumulated content as a
    /// buffer table when the cap would be exceeded.
    ///
    /// With `drop_tombstones` set (terminal-level output), tombstone inputs
    /// are discarded instead of emitted.
    pub fn append_to_buffer<I: TableIterator>(
        &mut self,
        it: &I,
        drop_tombstones: bool,
    ) -> Result<Option<BufferTable>> {
        if drop_tombstones && it.is_tombstone() {
            return Ok(None);
        }
        if self.try_push(it)? {
            return Ok(None);
        }
        let spilled = self.pop_buffer();
        self.seed(it)?;
        Ok(Some(spilled))
    }

    /// Like [`append_to_buffer`](Appender::append_to_buffer), but a spill is
    /// written out as an SST in `level`.
    pub fn append_to_file<I: TableIterator>(
        &mut self,
        it: &I,
        drop_tombstones: bool,
        fs: &Rc<FileSystem>,
        level: u32,
    ) -> Result<Option<FileTable>> {
        if drop_tombstones && it.is_tombstone() {
            return Ok(None);
        }
        if self.try_push(it)? {
            return Ok(None);
        }
        let spilled = self.pop_file(fs, level)?;
        self.seed(it)?;
        Ok(Some(spilled))
    }

    /// Takes the accumulated content as a buffer table, leaving the appender
    /// empty.
    pub fn pop_buffer(&mut self) -> BufferTable {
        let records = std::mem::take(&mut self.records);
        let values = std::mem::take(&mut self.values);
        self.file_size = self.opts.initial_file_size();
        BufferTable::new(KeyIndex::new(records), values)
    }

    /// Writes the accumulated content as an SST in `level`, leaving the
    /// appender empty.
    pub fn pop_file(&mut self, fs: &Rc<FileSystem>, level: u32) -> Result<FileTable> {
        let records = std::mem::take(&mut self.records);
        let values = std::mem::take(&mut self.values);
        self.file_size = self.opts.initial_file_size();
        let value_size = values.len() as u32;
        FileTable::create(
            fs,
            &self.opts,
            level,
            KeyIndex::new(records),
            value_size,
            |out| {
                use std::io::Write;
                out.write_all(&values)?;
                Ok(())
            },
        )
    }

    /// Appends if the record fits (or the appender is empty, accepting a
    /// lone oversized record). Returns whether it was taken.
    fn try_push<I: TableIterator>(&mut self, it: &I) -> Result<bool> {
        let new_size = self.file_size + RECORD_BYTES + it.value_size();
        if self.file_size == self.opts.initial_file_size() || new_size <= self.opts.max_file_size {
            self.file_size = new_size;
            self.push_record(it)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// First record of a fresh table, right after a spill.
    fn seed<I: TableIterator>(&mut self, it: &I) -> Result<()> {
        self.file_size += RECORD_BYTES + it.value_size();
        self.push_record(it)
    }

    fn push_record<I: TableIterator>(&mut self, it: &I) -> Result<()> {
        self.records.push(KeyOffset::new(
            it.key(),
            self.values.len() as u32,
            it.is_tombstone(),
        ));
        if it.value_size() > 0 {
            it.append_value_to(&mut self.values)?;
        }
        Ok(())
    }
}
