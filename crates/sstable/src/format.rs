//! On-disk primitives: the key type, packed key-offset records, and the
//! geometry shared by every file of one store.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result as IoResult, Write};

use bloom::BloomFilter;

/// Engine key: a fixed-width unsigned integer in natural order.
pub type Key = u64;

/// Bytes of a serialized [`Key`].
pub const KEY_BYTES: u32 = 8;
/// Bytes of one serialized [`KeyOffset`] record.
pub const RECORD_BYTES: u32 = KEY_BYTES + 4;
/// Bytes of the leading file timestamp.
pub const TIMESTAMP_BYTES: u32 = 8;

const OFFSET_MASK: u32 = 0x7fff_ffff;
const TOMBSTONE_BIT: u32 = 0x8000_0000;

/// One key-section record: a key plus its value offset with the tombstone
/// flag packed into the high bit.
///
/// Offsets are non-decreasing along the sorted key sequence of a table. A
/// tombstone consumes no value bytes, so its offset equals the next record's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOffset {
    key: Key,
    packed: u32,
}

impl KeyOffset {
    pub fn new(key: Key, offset: u32, tombstone: bool) -> Self {
        debug_assert!(offset <= OFFSET_MASK, "value offset exceeds 2^31 - 1");
        Self {
            key,
            packed: (offset & OFFSET_MASK) | if tombstone { TOMBSTONE_BIT } else { 0 },
        }
    }

    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// Byte offset of the value within the table's value section.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.packed & OFFSET_MASK
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.packed & TOMBSTONE_BIT != 0
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> IoResult<()> {
        w.write_u64::<LittleEndian>(self.key)?;
        w.write_u32::<LittleEndian>(self.packed)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> IoResult<Self> {
        let key = r.read_u64::<LittleEndian>()?;
        let packed = r.read_u32::<LittleEndian>()?;
        Ok(Self { key, packed })
    }
}

/// Table geometry fixed at engine construction and shared by every file of
/// one store: the per-SST byte cap and the bloom parameters.
///
/// The bloom region of a file is raw bits, so its width must be known before
/// a file can be opened; that is why these live in configuration rather than
/// in the file itself.
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// Per-SST byte cap. A lone entry larger than the cap still yields a
    /// single oversized file rather than an unsatisfiable write.
    pub max_file_size: u32,
    /// Bloom filter width in bits (M).
    pub bloom_bits: u64,
    /// Bloom hash count (k).
    pub bloom_hashes: u32,
}

impl TableOptions {
    /// Bytes of the key-section header: count + min + max + bloom bits.
    #[must_use]
    pub fn header_size(&self) -> u32 {
        4 + KEY_BYTES * 2 + BloomFilter::byte_len(self.bloom_bits) as u32
    }

    /// Size of a file holding zero records: timestamp + header. The size
    /// projections of the memtable and the appender start from this.
    #[must_use]
    pub fn initial_file_size(&self) -> u32 {
        TIMESTAMP_BYTES + self.header_size()
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            max_file_size: 2 * 1024 * 1024,
            bloom_bits: 10240 * 8,
            bloom_hashes: 3,
        }
    }
}
