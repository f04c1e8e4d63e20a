//! Recency-aware merge over sets of sorted tables.
//!
//! [`IteratorHeap`] yields a stream of **distinct** keys across any number of
//! same-kind cursors: the heap orders by `(key, freshness)`, so the top is
//! always the winning version, and [`proceed`](IteratorHeap::proceed) drains
//! every stale cursor positioned at the departing key in one step.
//!
//! [`merge_tables`] is the compaction merge: one heap of file cursors, one of
//! buffer cursors (buffer tables always beat file tables on a tie), fed
//! through an [`Appender`] that emits SSTs into the destination level while
//! the file budget lasts and buffer tables after it is spent.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::appender::Appender;
use crate::format::TableOptions;
use crate::fs::FileSystem;
use crate::table::{BufferTable, FileTable, TableIterator};
use crate::Result;

struct HeapItem<I: TableIterator>(I);

impl<I: TableIterator> PartialEq for HeapItem<I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<I: TableIterator> Eq for HeapItem<I> {}

impl<I: TableIterator> PartialOrd for HeapItem<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: TableIterator> Ord for HeapItem<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse the key comparison so the
        // smallest key pops first. On a key tie the fresher table pops
        // first -- that entry is the winning version.
        match other.0.key().cmp(&self.0.key()) {
            Ordering::Equal => {
                if self.0.table_is_prior(&other.0) {
                    Ordering::Greater
                } else if other.0.table_is_prior(&self.0) {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            }
            ord => ord,
        }
    }
}

/// Min-key heap of table cursors producing distinct keys, freshest version
/// first on ties.
pub struct IteratorHeap<I: TableIterator> {
    heap: BinaryHeap<HeapItem<I>>,
}

impl<I: TableIterator> IteratorHeap<I> {
    /// Builds the heap from cursors; exhausted ones are dropped up front.
    pub fn new(iters: Vec<I>) -> Self {
        let mut heap = BinaryHeap::with_capacity(iters.len());
        for it in iters {
            if it.valid() {
                heap.push(HeapItem(it));
            }
        }
        Self { heap }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The winning cursor for the current key, if any.
    #[must_use]
    pub fn top(&self) -> Option<&I> {
        self.heap.peek().map(|item| &item.0)
    }

    /// Moves past the current key: advances the top cursor and then every
    /// other cursor still positioned at the same key, dropping the stale
    /// versions.
    pub fn proceed(&mut self) {
        let key = match self.heap.peek() {
            Some(item) => item.0.key(),
            None => return,
        };
        loop {
            let mut item = match self.heap.pop() {
                Some(item) => item,
                None => return,
            };
            item.0.proceed();
            if item.0.valid() {
                self.heap.push(item);
            }
            match self.heap.peek() {
                Some(next) if next.0.key() == key => continue,
                _ => return,
            }
        }
    }
}

/// Accumulates merge output through an [`Appender`], emitting files while the
/// budget lasts and buffer tables afterwards.
struct MergeOutput<'a, F: FnMut(FileTable)> {
    appender: Appender,
    fs: &'a Rc<FileSystem>,
    dst_level: u32,
    file_budget: usize,
    drop_tombstones: bool,
    overflow: Vec<BufferTable>,
    emit_file: F,
}

impl<F: FnMut(FileTable)> MergeOutput<'_, F> {
    fn push<I: TableIterator>(&mut self, it: &I) -> Result<()> {
        if self.file_budget == 0 {
            if let Some(buffer) = self.appender.append_to_buffer(it, self.drop_tombstones)? {
                self.overflow.push(buffer);
            }
        } else if let Some(file) =
            self.appender
                .append_to_file(it, self.drop_tombstones, self.fs, self.dst_level)?
        {
            (self.emit_file)(file);
            self.file_budget -= 1;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<BufferTable>> {
        if !self.appender.is_empty() {
            if self.file_budget == 0 {
                self.overflow.push(self.appender.pop_buffer());
            } else {
                let file = self.appender.pop_file(self.fs, self.dst_level)?;
                (self.emit_file)(file);
            }
        }
        Ok(self.overflow)
    }
}

enum Next {
    File,
    Buffer,
    Both,
    Done,
}

/// Merges `file_tables` and `buffer_tables` into at most `file_budget` SSTs
/// written into `dst_level` (handed to `emit_file` as they finish), returning
/// the overflow buffer tables produced once the budget is spent.
///
/// Each key surfaces exactly once; on ties a buffer table beats any file
/// table, and file tables are ranked by `(level, timestamp)` freshness. With
/// `drop_tombstones` set, deletion markers are materialized as absence.
#[allow(clippy::too_many_arguments)]
pub fn merge_tables<F>(
    file_tables: &[FileTable],
    buffer_tables: &[BufferTable],
    fs: &Rc<FileSystem>,
    opts: TableOptions,
    dst_level: u32,
    file_budget: usize,
    drop_tombstones: bool,
    emit_file: F,
) -> Result<Vec<BufferTable>>
where
    F: FnMut(FileTable),
{
    let mut file_heap = IteratorHeap::new(file_tables.iter().map(|t| t.begin()).collect());
    let mut buffer_heap = IteratorHeap::new(buffer_tables.iter().map(|t| t.begin()).collect());

    let mut out = MergeOutput {
        appender: Appender::new(opts),
        fs,
        dst_level,
        file_budget,
        drop_tombstones,
        overflow: Vec::new(),
        emit_file,
    };

    loop {
        let next = match (file_heap.top(), buffer_heap.top()) {
            (Some(file), Some(buffer)) => match file.key().cmp(&buffer.key()) {
                Ordering::Less => Next::File,
                Ordering::Greater => Next::Buffer,
                // Same key in both: the buffer version is fresher.
                Ordering::Equal => Next::Both,
            },
            (Some(_), None) => Next::File,
            (None, Some(_)) => Next::Buffer,
            (None, None) => Next::Done,
        };
        match next {
            Next::File => {
                {
                    let it = file_heap.top().expect("file heap non-empty");
                    out.push(it)?;
                }
                file_heap.proceed();
            }
            Next::Buffer => {
                {
                    let it = buffer_heap.top().expect("buffer heap non-empty");
                    out.push(it)?;
                }
                buffer_heap.proceed();
            }
            Next::Both => {
                {
                    let it = buffer_heap.top().expect("buffer heap non-empty");
                    out.push(it)?;
                }
                file_heap.proceed();
                buffer_heap.proceed();
            }
            Next::Done => break,
        }
    }

    out.finish()
}
