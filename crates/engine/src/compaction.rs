//! Compaction: the level pipeline.
//!
//! The pipeline runs whenever a flush finds level 0 at capacity. Each round
//! takes the pending buffer tables plus the level's own contribution
//! (everything for a tiering level, the newest overflow suffix for a
//! leveling one), absorbs the overlapping files of the destination when the
//! destination keeps disjoint ranges (leveling or terminal), and merges the
//! lot into the destination. Output files are bounded by the destination's
//! spare capacity; once that budget is spent the merge emits buffer tables
//! instead, which become the next round's input one level deeper. Tombstones
//! are materialized as deletions only when writing the terminal level.
//!
//! Consumed source files are unlinked only after the whole pipeline
//! finished, so a failure mid-way never leaves keys ranges unreferenced.

use anyhow::Result;
use log::{debug, info};
use sstable::{merge_tables, BufferTable, FileTable};
use std::path::PathBuf;

use crate::{Engine, LevelKind, ValueCodec};

impl<C: ValueCodec> Engine<C> {
    /// Runs the pipeline starting at `level` with `buffers` as the incoming
    /// data for that level.
    pub(crate) fn compact(&mut self, level: usize, buffers: Vec<BufferTable>) -> Result<()> {
        let configured = self.opts.levels.len();
        let mut level = level;
        let mut buffers = buffers;
        let mut consumed_paths: Vec<PathBuf> = Vec::new();

        while level < configured && !buffers.is_empty() {
            let dst = level + 1;
            let dst_is_terminal = dst == configured;

            // 1. The level's own contribution to the merge.
            let mut src_files: Vec<FileTable> = Vec::new();
            {
                let level_vec = &mut self.levels[level];
                match self.opts.levels[level].kind {
                    LevelKind::Tiering => src_files.append(level_vec),
                    LevelKind::Leveling => {
                        while level_vec.len() > self.opts.levels[level].max_files {
                            src_files.push(level_vec.pop().expect("len checked above"));
                        }
                    }
                }
            }

            // 2. Absorb the destination's overlapping files when it keeps
            // disjoint ranges. Overlap is judged against the sources taken
            // from `level` and the incoming buffers, not against files
            // already absorbed.
            if dst_is_terminal || self.opts.levels[dst].kind == LevelKind::Leveling {
                let own_sources = src_files.len();
                let dst_vec = &mut self.levels[dst];
                let mut at = 0;
                while at < dst_vec.len() {
                    let candidate = &dst_vec[at];
                    let overlapping = src_files[..own_sources]
                        .iter()
                        .any(|s| candidate.overlaps(s.min_key(), s.max_key()))
                        || buffers
                            .iter()
                            .any(|b| candidate.overlaps(b.min_key(), b.max_key()));
                    if overlapping {
                        src_files.push(dst_vec.remove(at));
                    } else {
                        at += 1;
                    }
                }
            }

            for table in &src_files {
                consumed_paths.push(table.path().to_path_buf());
            }

            // 3. Output-file budget: the destination's spare capacity, or
            // unbounded at the terminal level. A tiering destination takes
            // no files; everything cascades as buffers.
            let file_budget = if dst_is_terminal {
                usize::MAX
            } else if self.opts.levels[dst].kind == LevelKind::Leveling {
                let occupied = self.levels[dst].len();
                self.opts.levels[dst].max_files.max(occupied) - occupied
            } else {
                0
            };

            debug!(
                "compacting level {}: {} source files, {} buffers, budget {} into level {}",
                level,
                src_files.len(),
                buffers.len(),
                file_budget,
                dst
            );

            // 4. Merge; finished files land in the destination immediately.
            let overflow = merge_tables(
                &src_files,
                &buffers,
                &self.fs,
                self.table_opts,
                dst as u32,
                file_budget,
                dst_is_terminal,
                |file| self.levels[dst].push(file),
            )?;

            // 5. Overflow seeds the next round.
            buffers = overflow;
            level = dst;
        }

        // 6. Sources are fully replaced; unlink them.
        for path in &consumed_paths {
            self.fs.remove_file(path)?;
        }
        if !consumed_paths.is_empty() {
            info!(
                "compaction consumed {} files, store now holds {}",
                consumed_paths.len(),
                self.file_count()
            );
        }
        Ok(())
    }
}
