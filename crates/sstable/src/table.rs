//! Table abstractions: the sorted key index, the memory-resident buffer
//! table, the file-resident SST, and their shared iteration contract.
//!
//! Buffer tables and file tables expose the same cursor operations so that
//! the merge machinery can treat them uniformly, but they stay distinct
//! types: every merge loop is monomorphized per table kind instead of
//! dispatching through a trait object.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bloom::BloomFilter;

use crate::format::{Key, KeyOffset, TableOptions, RECORD_BYTES, TIMESTAMP_BYTES};
use crate::fs::FileSystem;
use crate::{Error, Result};

/// Sorted key-offset records with their derived range. Never empty.
#[derive(Debug)]
pub struct KeyIndex {
    records: Vec<KeyOffset>,
}

impl KeyIndex {
    /// Wraps records that are already in ascending key order with
    /// non-decreasing offsets (the order every producer emits).
    pub fn new(records: Vec<KeyOffset>) -> Self {
        debug_assert!(!records.is_empty(), "a table holds at least one record");
        debug_assert!(records
            .windows(2)
            .all(|w| w[0].key() < w[1].key() && w[0].offset() <= w[1].offset()));
        Self { records }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.records.len() as u32
    }

    #[must_use]
    pub fn min_key(&self) -> Key {
        self.records[0].key()
    }

    #[must_use]
    pub fn max_key(&self) -> Key {
        self.records[self.records.len() - 1].key()
    }

    #[must_use]
    pub fn records(&self) -> &[KeyOffset] {
        &self.records
    }

    /// Index of the first record with `record.key >= key`; `count` if none.
    #[must_use]
    pub fn lower_bound(&self, key: Key) -> usize {
        self.records.partition_point(|r| r.key() < key)
    }

    /// Index of the exact record for `key`, gated by the table's range.
    #[must_use]
    pub fn find(&self, key: Key) -> Option<usize> {
        if key < self.min_key() || key > self.max_key() {
            return None;
        }
        let at = self.lower_bound(key);
        if at < self.records.len() && self.records[at].key() == key {
            Some(at)
        } else {
            None
        }
    }
}

/// Cursor over one sorted table.
///
/// `key`, `is_tombstone`, and `value_size` may only be called while
/// [`valid`](TableIterator::valid) holds.
pub trait TableIterator {
    fn valid(&self) -> bool;
    fn key(&self) -> Key;
    fn is_tombstone(&self) -> bool;
    /// Encoded value length, from the offset delta to the next record.
    fn value_size(&self) -> u32;
    /// Appends the raw encoded value bytes to `dst`.
    fn append_value_to(&self, dst: &mut Vec<u8>) -> Result<()>;
    fn proceed(&mut self);
    /// Whether this cursor's table is fresher than `other`'s. This is the
    /// authoritative tie-break when a merge sees the same key twice.
    fn table_is_prior(&self, other: &Self) -> bool;

    /// Reads the raw encoded value bytes.
    fn read_value_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.value_size() as usize);
        self.append_value_to(&mut buf)?;
        Ok(buf)
    }
}

// ---------------------------------------------------------------- buffer

/// Memory-resident analogue of an SST: a sorted index plus a value blob.
///
/// Buffer tables are transient. A flush or merge stage creates one, the next
/// stage consumes it; they are never persisted under their own name.
#[derive(Debug)]
pub struct BufferTable {
    index: KeyIndex,
    values: Vec<u8>,
}

impl BufferTable {
    pub fn new(index: KeyIndex, values: Vec<u8>) -> Self {
        Self { index, values }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.index.count()
    }

    #[must_use]
    pub fn min_key(&self) -> Key {
        self.index.min_key()
    }

    #[must_use]
    pub fn max_key(&self) -> Key {
        self.index.max_key()
    }

    #[must_use]
    pub fn value_bytes(&self) -> &[u8] {
        &self.values
    }

    #[must_use]
    pub fn overlaps(&self, min: Key, max: Key) -> bool {
        !(self.max_key() < min || max < self.min_key())
    }

    #[must_use]
    pub fn begin(&self) -> BufferTableIter<'_> {
        BufferTableIter { table: self, at: 0 }
    }

    fn value_end(&self, at: usize) -> u32 {
        match self.index.records().get(at + 1) {
            Some(next) => next.offset(),
            None => self.values.len() as u32,
        }
    }
}

pub struct BufferTableIter<'a> {
    table: &'a BufferTable,
    at: usize,
}

impl TableIterator for BufferTableIter<'_> {
    fn valid(&self) -> bool {
        self.at < self.table.index.records().len()
    }

    fn key(&self) -> Key {
        self.table.index.records()[self.at].key()
    }

    fn is_tombstone(&self) -> bool {
        self.table.index.records()[self.at].is_tombstone()
    }

    fn value_size(&self) -> u32 {
        self.table.value_end(self.at) - self.table.index.records()[self.at].offset()
    }

    fn append_value_to(&self, dst: &mut Vec<u8>) -> Result<()> {
        let start = self.table.index.records()[self.at].offset() as usize;
        let end = self.table.value_end(self.at) as usize;
        dst.extend_from_slice(&self.table.values[start..end]);
        Ok(())
    }

    fn proceed(&mut self) {
        self.at += 1;
    }

    /// A buffer table is always newer than any file table; among buffer
    /// tables no order is defined (a merge never holds two with overlapping
    /// keys).
    fn table_is_prior(&self, _other: &Self) -> bool {
        false
    }
}

// ---------------------------------------------------------------- file

/// A loaded SST: the eagerly parsed key section plus on-demand value reads
/// through the shared stream pool.
#[derive(Debug)]
pub struct FileTable {
    fs: Rc<FileSystem>,
    path: PathBuf,
    level: u32,
    timestamp: u64,
    index: KeyIndex,
    bloom: BloomFilter,
    /// Byte position of the value section within the file.
    value_offset: u32,
    value_size: u32,
}

impl FileTable {
    /// Writes a fresh SST into `level` and returns its loaded handle.
    ///
    /// The caller supplies the finished index and a writer for exactly
    /// `value_size` bytes of concatenated encoded values; the bloom filter is
    /// built here from the index keys. The file becomes referenced only when
    /// every write succeeded.
    pub fn create<F>(
        fs: &Rc<FileSystem>,
        opts: &TableOptions,
        level: u32,
        index: KeyIndex,
        value_size: u32,
        write_values: F,
    ) -> Result<FileTable>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let mut bloom = BloomFilter::new(opts.bloom_bits, opts.bloom_hashes);
        for record in index.records() {
            bloom.insert(&record.key().to_le_bytes());
        }

        let (timestamp, path) = fs.create_file(level, |out| {
            out.write_u32::<LittleEndian>(index.count())?;
            out.write_u64::<LittleEndian>(index.min_key())?;
            out.write_u64::<LittleEndian>(index.max_key())?;
            bloom.write_to(out)?;
            for record in index.records() {
                record.write_to(out)?;
            }
            write_values(out)
        })?;

        let value_offset = TIMESTAMP_BYTES + opts.header_size() + index.count() * RECORD_BYTES;
        Ok(FileTable {
            fs: Rc::clone(fs),
            path,
            level,
            timestamp,
            index,
            bloom,
            value_offset,
            value_size,
        })
    }

    /// Loads the key section of an existing SST and registers its timestamp
    /// with the manager. The value section stays on disk.
    ///
    /// # Errors
    ///
    /// [`Error::Corrupt`] when the key section cannot be parsed or is
    /// inconsistent with the file size.
    pub fn open(
        fs: &Rc<FileSystem>,
        opts: &TableOptions,
        path: PathBuf,
        level: u32,
    ) -> Result<FileTable> {
        let file_len = std::fs::metadata(&path)?.len();
        let records_start = (TIMESTAMP_BYTES + opts.header_size()) as u64;
        if file_len < records_start {
            return Err(Error::corrupt(&path, "file shorter than the key section header"));
        }

        let (timestamp, index, bloom, value_offset, value_size) = fs.with_stream(&path, 0, |file| {
            let mut r = BufReader::new(file);
            let timestamp = r.read_u64::<LittleEndian>()?;
            let count = r.read_u32::<LittleEndian>()?;
            let min_key = r.read_u64::<LittleEndian>()?;
            let max_key = r.read_u64::<LittleEndian>()?;
            if count == 0 {
                return Err(Error::corrupt(&path, "empty key section"));
            }
            if min_key > max_key {
                return Err(Error::corrupt(&path, "min_key exceeds max_key"));
            }
            let bloom = BloomFilter::read_from(&mut r, opts.bloom_bits, opts.bloom_hashes)?;

            let records_end = records_start + count as u64 * RECORD_BYTES as u64;
            if file_len < records_end {
                return Err(Error::corrupt(&path, "key section extends past end of file"));
            }
            let value_offset = u32::try_from(records_end)
                .map_err(|_| Error::corrupt(&path, "key section too large"))?;
            let value_size = u32::try_from(file_len - records_end)
                .map_err(|_| Error::corrupt(&path, "value section too large"))?;

            let mut records = Vec::with_capacity(count as usize);
            let mut prev: Option<KeyOffset> = None;
            for _ in 0..count {
                let record = KeyOffset::read_from(&mut r)?;
                if let Some(p) = prev {
                    if record.key() <= p.key() {
                        return Err(Error::corrupt(&path, "keys not strictly ascending"));
                    }
                    if record.offset() < p.offset() {
                        return Err(Error::corrupt(&path, "value offsets decrease"));
                    }
                }
                if record.offset() > value_size {
                    return Err(Error::corrupt(&path, "value offset past end of file"));
                }
                prev = Some(record);
                records.push(record);
            }
            if records[0].key() != min_key || records[count as usize - 1].key() != max_key {
                return Err(Error::corrupt(&path, "header range disagrees with records"));
            }

            Ok((timestamp, KeyIndex::new(records), bloom, value_offset, value_size))
        })?;

        fs.advance_past(timestamp);

        Ok(FileTable {
            fs: Rc::clone(fs),
            path,
            level,
            timestamp,
            index,
            bloom,
            value_offset,
            value_size,
        })
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.index.count()
    }

    #[must_use]
    pub fn min_key(&self) -> Key {
        self.index.min_key()
    }

    #[must_use]
    pub fn max_key(&self) -> Key {
        self.index.max_key()
    }

    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Freshness order among file tables: lower level wins, ties go to the
    /// higher timestamp.
    #[must_use]
    pub fn is_prior_to(&self, other: &FileTable) -> bool {
        self.level < other.level
            || (self.level == other.level && self.timestamp > other.timestamp)
    }

    #[must_use]
    pub fn overlaps(&self, min: Key, max: Key) -> bool {
        !(self.max_key() < min || max < self.min_key())
    }

    /// Exact lookup: range gate, then bloom gate, then binary search.
    /// A positive answer positions a cursor on the record, which may be a
    /// tombstone.
    #[must_use]
    pub fn find(&self, key: Key) -> Option<FileTableIter<'_>> {
        if key < self.min_key() || key > self.max_key() {
            return None;
        }
        if !self.bloom.may_contain(&key.to_le_bytes()) {
            return None;
        }
        self.index
            .find(key)
            .map(|at| FileTableIter { table: self, at })
    }

    /// Cursor on the first record with `record.key >= key` (possibly
    /// exhausted).
    #[must_use]
    pub fn lower_bound(&self, key: Key) -> FileTableIter<'_> {
        FileTableIter {
            table: self,
            at: self.index.lower_bound(key),
        }
    }

    #[must_use]
    pub fn begin(&self) -> FileTableIter<'_> {
        FileTableIter { table: self, at: 0 }
    }

    fn value_end(&self, at: usize) -> u32 {
        match self.index.records().get(at + 1) {
            Some(next) => next.offset(),
            None => self.value_size,
        }
    }

    fn read_value_into(&self, offset: u32, dst: &mut [u8]) -> Result<()> {
        self.fs.read_exact_at(
            &self.path,
            self.value_offset as u64 + offset as u64,
            dst,
        )
    }
}

pub struct FileTableIter<'a> {
    table: &'a FileTable,
    at: usize,
}

impl FileTableIter<'_> {
    #[must_use]
    pub fn table(&self) -> &FileTable {
        self.table
    }
}

impl TableIterator for FileTableIter<'_> {
    fn valid(&self) -> bool {
        self.at < self.table.index.records().len()
    }

    fn key(&self) -> Key {
        self.table.index.records()[self.at].key()
    }

    fn is_tombstone(&self) -> bool {
        self.table.index.records()[self.at].is_tombstone()
    }

    fn value_size(&self) -> u32 {
        self.table.value_end(self.at) - self.table.index.records()[self.at].offset()
    }

    fn append_value_to(&self, dst: &mut Vec<u8>) -> Result<()> {
        let len = self.value_size() as usize;
        if len == 0 {
            return Ok(());
        }
        let start = dst.len();
        dst.resize(start + len, 0);
        self.table.read_value_into(
            self.table.index.records()[self.at].offset(),
            &mut dst[start..],
        )
    }

    fn proceed(&mut self) {
        self.at += 1;
    }

    fn table_is_prior(&self, other: &Self) -> bool {
        self.table.is_prior_to(other.table)
    }
}
