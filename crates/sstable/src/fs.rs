//! File-system manager: level directories, the global timestamp counter, and
//! the pooled read handles.
//!
//! One manager owns one store directory. SSTs live in `level-<N>`
//! subdirectories and are named `<timestamp>.sst`; the timestamp counter is
//! advanced past every timestamp observed during enumeration, so names stay
//! unique across restarts. There is no manifest: bootstrap trusts the
//! directory tree and the per-file timestamps. (A crash between two writes
//! of the same timestamp is therefore undetectable; recovery relies only on
//! completed files.)
//!
//! The manager is shared behind `Rc` by every open file table, which is why
//! the mutable bits (counter, handle pool) use interior mutability. The
//! engine is single-threaded; nothing here is `Sync`.

use byteorder::{LittleEndian, WriteBytesExt};
use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::lru::LruCache;
use crate::{Error, Result};

pub struct FileSystem {
    root: PathBuf,
    /// Number of configured levels; directories run `level-0..level-levels`
    /// inclusive, the last being the unbounded terminal level.
    levels: u32,
    timestamp: Cell<u64>,
    streams: RefCell<LruCache<PathBuf, File>>,
}

impl FileSystem {
    /// Creates the manager, the root directory, and the level skeleton.
    pub fn new(root: impl Into<PathBuf>, levels: u32, stream_capacity: usize) -> Result<Self> {
        let fs = Self {
            root: root.into(),
            levels,
            timestamp: Cell::new(0),
            streams: RefCell::new(LruCache::new(stream_capacity)),
        };
        fs.init_directory()?;
        Ok(fs)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next timestamp to be assigned.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp.get()
    }

    /// Moves the counter past an observed file timestamp.
    pub fn advance_past(&self, timestamp: u64) {
        self.timestamp.set(self.timestamp.get().max(timestamp + 1));
    }

    /// Visits every `*.sst` regular file under a `level-<N>` directory with
    /// `N <= levels`. Other directories and entries are skipped silently.
    pub fn for_each_file<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(PathBuf, u32) -> Result<()>,
    {
        for entry in fs::read_dir(&self.root).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            if !entry.file_type().map_err(Error::Io)?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let level = match name.to_str().and_then(|n| n.strip_prefix("level-")) {
                Some(n) => match n.parse::<u32>() {
                    Ok(level) => level,
                    Err(_) => continue,
                },
                None => continue,
            };
            if level > self.levels {
                continue;
            }
            for file in fs::read_dir(entry.path()).map_err(Error::Io)? {
                let file = file.map_err(Error::Io)?;
                if !file.file_type().map_err(Error::Io)?.is_file() {
                    continue;
                }
                let path = file.path();
                if path.extension().map_or(false, |ext| ext == "sst") {
                    visit(path, level)?;
                }
            }
        }
        Ok(())
    }

    /// Allocates the next timestamp, creates `level-<level>/<ts>.sst`, writes
    /// the timestamp prefix, and hands the stream to `write`. The counter
    /// advances only when the whole write succeeds, so a failed attempt does
    /// not burn a name.
    pub fn create_file<F>(&self, level: u32, write: F) -> Result<(u64, PathBuf)>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let timestamp = self.timestamp.get();
        let path = self.level_dir(level).join(format!("{timestamp}.sst"));
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_u64::<LittleEndian>(timestamp)?;
        write(&mut out)?;
        out.flush()?;
        out.into_inner().map_err(|e| Error::Io(e.into_error()))?.sync_all()?;
        self.timestamp.set(timestamp + 1);
        Ok((timestamp, path))
    }

    /// Runs `read` against the pooled handle for `path`, positioned at `pos`.
    ///
    /// The handle may have been evicted and reopened since the last call, so
    /// the seek happens unconditionally. `read` must not re-enter the stream
    /// pool (by reading another file) -- take one stream at a time.
    pub fn with_stream<T, F>(&self, path: &Path, pos: u64, read: F) -> Result<T>
    where
        F: FnOnce(&mut File) -> Result<T>,
    {
        let mut streams = self.streams.borrow_mut();
        let file = streams.get_or_insert_with(&path.to_path_buf(), |p| {
            File::open(p).map_err(Error::Io)
        })?;
        file.seek(SeekFrom::Start(pos))?;
        read(file)
    }

    /// Reads exactly `buf.len()` bytes at `pos`.
    pub fn read_exact_at(&self, path: &Path, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.with_stream(path, pos, |file| {
            file.read_exact(buf)?;
            Ok(())
        })
    }

    /// Unlinks a consumed SST, dropping its pooled handle first.
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        self.streams.borrow_mut().remove(&path.to_path_buf());
        fs::remove_file(path)?;
        Ok(())
    }

    /// Closes every handle, removes the directory tree, zeroes the counter,
    /// and recreates the skeleton.
    pub fn reset(&self) -> Result<()> {
        self.streams.borrow_mut().clear();
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        self.timestamp.set(0);
        self.init_directory()
    }

    fn level_dir(&self, level: u32) -> PathBuf {
        self.root.join(format!("level-{level}"))
    }

    fn init_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        for level in 0..=self.levels {
            let dir = self.level_dir(level);
            if !dir.exists() {
                fs::create_dir(&dir)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("root", &self.root)
            .field("levels", &self.levels)
            .field("timestamp", &self.timestamp.get())
            .field("open_streams", &self.streams.borrow().len())
            .finish()
    }
}
