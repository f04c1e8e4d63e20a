//! # Memtable - in-memory write buffer
//!
//! Recent writes land in a [`SkipList`] keyed by the engine key type. Each
//! entry is a [`MemValue`]: either the encoded value bytes or a tombstone.
//!
//! The memtable tracks, byte for byte, the size of the SST that flushing it
//! right now would produce: the fixed file prefix (timestamp + header +
//! bloom), one key-offset record per entry, and the encoded value bytes.
//! A mutation that would push this projection over the per-file cap is
//! refused instead of applied; the caller flushes, clears, and re-applies.
//! The one exception is a single entry whose cost alone exceeds the cap:
//! an empty memtable always accepts it, yielding one oversized table rather
//! than an unsatisfiable write.
//!
//! The projection is exact, so no produced SST ever exceeds the cap and the
//! flush decision needs no second measurement pass.

mod skiplist;

pub use skiplist::{SkipList, SkipListParams};

/// One memtable slot: the encoded value, or a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemValue {
    /// Encoded value bytes, produced by the engine's value codec.
    Present(Vec<u8>),
    /// Tombstone: the key is deleted and shadows older versions on disk.
    Tombstone,
}

impl MemValue {
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, MemValue::Tombstone)
    }

    /// Encoded length in bytes; zero for a tombstone.
    #[must_use]
    pub fn encoded_len(&self) -> u32 {
        match self {
            MemValue::Present(bytes) => bytes.len() as u32,
            MemValue::Tombstone => 0,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MemValue::Present(bytes) => Some(bytes),
            MemValue::Tombstone => None,
        }
    }
}

/// Skip-list write buffer with exact flush-size accounting.
pub struct Memtable<K: Copy + Ord> {
    list: SkipList<K, MemValue>,
    /// Projected size of the SST this memtable would flush to.
    file_size: u32,
    /// Size of an empty SST: timestamp + header + bloom bytes.
    initial_file_size: u32,
    /// On-disk size of one key-offset record.
    record_size: u32,
    /// Per-SST byte cap.
    max_file_size: u32,
}

impl<K: Copy + Ord> Memtable<K> {
    pub fn new(
        params: SkipListParams,
        initial_file_size: u32,
        record_size: u32,
        max_file_size: u32,
    ) -> Self {
        Self {
            list: SkipList::new(params),
            file_size: initial_file_size,
            initial_file_size,
            record_size,
            max_file_size,
        }
    }

    /// Stages `bytes` under `key`.
    ///
    /// `Err(bytes)` hands the value back when applying it would overflow the
    /// per-file cap: the caller must flush, [`clear`](Memtable::clear), and
    /// re-apply (which then always succeeds).
    pub fn put(&mut self, key: K, bytes: Vec<u8>) -> Result<(), Vec<u8>> {
        let value_size = bytes.len() as u32;
        let mut pending = Some(bytes);

        let file_size = &mut self.file_size;
        let initial = self.initial_file_size;
        let record = self.record_size;
        let cap = self.max_file_size;
        let committed = self.list.replace(key, |old| {
            let new_size = match old {
                Some(v) => *file_size - v.encoded_len() + value_size,
                None => *file_size + record + value_size,
            };
            if *file_size != initial && new_size > cap {
                return None;
            }
            *file_size = new_size;
            Some(MemValue::Present(pending.take().expect("value staged once")))
        });

        match pending.take() {
            None => Ok(()),
            Some(bytes) => {
                debug_assert!(!committed);
                Err(bytes)
            }
        }
    }

    /// Stages a tombstone under `key`.
    ///
    /// Returns `false` when the tombstone record would overflow the cap; the
    /// caller flushes, clears, and re-applies.
    pub fn delete(&mut self, key: K) -> bool {
        let file_size = &mut self.file_size;
        let initial = self.initial_file_size;
        let record = self.record_size;
        let cap = self.max_file_size;
        self.list.replace(key, |old| {
            let new_size = match old {
                Some(v) => *file_size - v.encoded_len(),
                None => *file_size + record,
            };
            if *file_size != initial && new_size > cap {
                return None;
            }
            *file_size = new_size;
            Some(MemValue::Tombstone)
        })
    }

    #[must_use]
    pub fn get(&self, key: K) -> Option<&MemValue> {
        self.list.search(key)
    }

    /// Visits entries in ascending key order.
    pub fn for_each<F>(&self, visit: F)
    where
        F: FnMut(K, &MemValue),
    {
        self.list.for_each(visit);
    }

    /// Visits entries with `min <= key <= max` in ascending key order.
    pub fn scan<F>(&self, min: K, max: K, visit: F)
    where
        F: FnMut(K, &MemValue),
    {
        self.list.scan(min, max, visit);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drops every entry and resets the size projection.
    pub fn clear(&mut self) {
        self.list.clear();
        self.file_size = self.initial_file_size;
    }

    /// Current projected SST size in bytes.
    #[must_use]
    pub fn projected_file_size(&self) -> u32 {
        self.file_size
    }

    /// Total encoded value bytes currently staged (excludes records and the
    /// file prefix). This is the value-section size of the flushed table.
    #[must_use]
    pub fn value_bytes_len(&self) -> u32 {
        self.file_size - self.initial_file_size - self.list.len() as u32 * self.record_size
    }
}
