//! Read path: `get()` and `scan()`.
//!
//! Point lookups consult the memtable, then every level from 0 upward,
//! files within a level newest first. The first table containing the key
//! decides: a tombstone means absent, a value wins outright.
//!
//! Range scans interleave the memtable's ordered traversal with a
//! freshness-aware heap over every file overlapping the range, so each live
//! key is emitted exactly once, newest version first, in ascending order.

use anyhow::Result;
use sstable::{IteratorHeap, Key, TableIterator, ValueCodec};

use crate::Engine;

impl<C: ValueCodec> Engine<C> {
    /// Looks up `key`, returning the decoded value if it is live.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a corrupt value region; a missing key is
    /// `Ok(None)`.
    pub fn get(&self, key: Key) -> Result<Option<C::Value>> {
        if let Some(value) = self.mem.get(key) {
            return match value.as_bytes() {
                None => Ok(None),
                Some(bytes) => Ok(Some(C::decode(bytes)?)),
            };
        }

        for level_vec in &self.levels {
            for table in level_vec.iter().rev() {
                if let Some(it) = table.find(key) {
                    if it.is_tombstone() {
                        return Ok(None);
                    }
                    let bytes = it.read_value_bytes()?;
                    return Ok(Some(C::decode(&bytes)?));
                }
            }
        }
        Ok(None)
    }

    /// Visits every live pair with `min_key <= key <= max_key` in ascending
    /// key order, each key exactly once, the newest version winning.
    /// Tombstoned keys are skipped.
    pub fn scan<F>(&self, min_key: Key, max_key: Key, mut visit: F) -> Result<()>
    where
        F: FnMut(Key, C::Value),
    {
        let mut iters = Vec::new();
        for level_vec in &self.levels {
            for table in level_vec {
                if table.overlaps(min_key, max_key) {
                    iters.push(table.lower_bound(min_key));
                }
            }
        }
        let mut heap = IteratorHeap::new(iters);
        let mut failure: Option<anyhow::Error> = None;

        self.mem.scan(min_key, max_key, |key, mem_value| {
            if failure.is_some() {
                return;
            }
            // Emit file keys strictly below the next memtable key first.
            while let Some(top) = heap.top() {
                if top.key() >= key {
                    break;
                }
                if !top.is_tombstone() {
                    let decoded = top
                        .read_value_bytes()
                        .map_err(anyhow::Error::from)
                        .and_then(|bytes| Ok(C::decode(&bytes)?));
                    match decoded {
                        Ok(value) => visit(top.key(), value),
                        Err(e) => {
                            failure = Some(e);
                            return;
                        }
                    }
                }
                heap.proceed();
            }
            // The memtable version shadows any file version of the same key.
            if let Some(top) = heap.top() {
                if top.key() == key {
                    heap.proceed();
                }
            }
            if let Some(bytes) = mem_value.as_bytes() {
                match C::decode(bytes) {
                    Ok(value) => visit(key, value),
                    Err(e) => failure = Some(e.into()),
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        // Remaining file keys up to the bound.
        while let Some(top) = heap.top() {
            if top.key() > max_key {
                break;
            }
            if !top.is_tombstone() {
                let bytes = top.read_value_bytes()?;
                visit(top.key(), C::decode(&bytes)?);
            }
            heap.proceed();
        }
        Ok(())
    }
}
