//! # Bloom Filter
//!
//! A space-efficient probabilistic data structure for set membership testing.
//!
//! A bloom filter can tell you with certainty that a key is **not** in the set
//! (no false negatives), but may occasionally report that a key **is** in the
//! set when it isn't (false positives). The false positive rate depends on the
//! number of bits and hash functions used.
//!
//! ## Usage in the engine
//!
//! Every SST embeds a bloom filter built from its keys, sized by the engine
//! configuration (`num_bits`, `num_hashes`) so that all files of one store
//! share the same parameters. Point lookups check the filter before touching
//! the key index -- a negative answer skips the file entirely.
//!
//! Because the parameters are fixed by configuration, the serialized form is
//! the raw bit array alone: exactly [`BloomFilter::byte_len`] bytes, no
//! header. A filter written to disk and reloaded answers identically: the
//! probe positions are a pure function of the key bytes and the configured
//! width, with no per-filter state.
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new(8192, 3);
//! bf.insert(&42u64.to_le_bytes());
//! assert!(bf.may_contain(&42u64.to_le_bytes()));
//! ```

use std::io::{self, Read, Write};

/// A bloom filter backed by a bit vector with `k` derived probe positions
/// per key.
///
/// The key is hashed once (FNV-1a); that hash picks the first probe, and a
/// scrambled copy of it picks the stride that the remaining `k - 1` probes
/// step along. One hash pass per operation, no per-probe rehashing.
pub struct BloomFilter {
    /// The bit vector storing the filter state.
    bits: Vec<u8>,
    /// Number of bits in the filter.
    num_bits: u64,
    /// Number of hash functions (k).
    num_hashes: u32,
}

impl BloomFilter {
    /// Creates an empty bloom filter with exactly `num_bits` bits and
    /// `num_hashes` hash functions.
    ///
    /// # Panics
    ///
    /// Panics if `num_bits` or `num_hashes` is 0.
    pub fn new(num_bits: u64, num_hashes: u32) -> Self {
        assert!(num_bits > 0, "num_bits must be > 0");
        assert!(num_hashes > 0, "num_hashes must be > 0");
        Self {
            bits: vec![0u8; Self::byte_len(num_bits)],
            num_bits,
            num_hashes,
        }
    }

    /// Creates a bloom filter sized for `expected_items` with the given
    /// target `false_positive_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in `(0, 1)`.
    pub fn for_items(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        // Optimal number of bits: m = -n * ln(p) / (ln(2)^2)
        let n = expected_items as f64;
        let m = (-n * false_positive_rate.ln() / (std::f64::consts::LN_2.powi(2))).ceil() as u64;
        let m = m.max(8);

        // Optimal number of hashes: k = (m/n) * ln(2)
        let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as u32;
        let k = k.max(1);

        Self::new(m, k)
    }

    /// Number of bytes occupied by a filter of `num_bits` bits, on disk and
    /// in memory: `ceil(num_bits / 8)`.
    #[must_use]
    pub fn byte_len(num_bits: u64) -> usize {
        ((num_bits + 7) / 8) as usize
    }

    /// Inserts a key into the bloom filter.
    pub fn insert(&mut self, key: &[u8]) {
        let (mut probe, step) = self.probe_walk(key);
        for _ in 0..self.num_hashes {
            let (byte, mask) = locate(probe);
            self.bits[byte] |= mask;
            probe = self.advance(probe, step);
        }
    }

    /// Returns `true` if the key **might** be in the set, `false` if it is
    /// **definitely not** in the set.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (mut probe, step) = self.probe_walk(key);
        for _ in 0..self.num_hashes {
            let (byte, mask) = locate(probe);
            if self.bits[byte] & mask == 0 {
                return false;
            }
            probe = self.advance(probe, step);
        }
        true
    }

    /// Returns the number of bits in the filter.
    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Returns the number of hash functions.
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Returns the size of the serialized filter in bytes: the raw bit array,
    /// nothing else.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        self.bits.len()
    }

    /// Writes the raw bit array to `w`, exactly
    /// [`serialized_size`](BloomFilter::serialized_size) bytes.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.bits)
    }

    /// Reads a filter of `num_bits` bits back from `r`. The parameters must
    /// match the ones the filter was built with; they are not stored in the
    /// serialized form.
    pub fn read_from<R: Read>(r: &mut R, num_bits: u64, num_hashes: u32) -> io::Result<Self> {
        let mut bits = vec![0u8; Self::byte_len(num_bits)];
        r.read_exact(&mut bits)?;
        Ok(Self {
            bits,
            num_bits,
            num_hashes,
        })
    }

    // ---- Internal helpers ----

    /// Seeds the probe sequence for `key`: the first probe position and the
    /// step between consecutive probes, both already reduced into the bit
    /// array. The step comes from scrambling the primary hash and is kept
    /// nonzero, so successive probes always move.
    fn probe_walk(&self, key: &[u8]) -> (u64, u64) {
        let primary = fnv1a(key);
        let step = (scramble(primary) % self.num_bits).max(1);
        (primary % self.num_bits, step)
    }

    fn advance(&self, probe: u64, step: u64) -> u64 {
        (probe + step) % self.num_bits
    }
}

/// Splits a probe position into the byte holding it and the mask selecting
/// it within that byte.
fn locate(probe: u64) -> (usize, u8) {
    ((probe >> 3) as usize, 1 << (probe & 7))
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("bytes", &self.bits.len())
            .finish()
    }
}

/// Primary key hash: 64-bit FNV-1a with the standard offset basis.
fn fnv1a(data: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// splitmix64 finalizer. Turns the primary hash into a probe stride that
/// looks unrelated to it, so one hash of the key is enough to seed the whole
/// probe sequence.
fn scramble(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}
