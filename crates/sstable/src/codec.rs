//! Pluggable value codec.
//!
//! The engine treats values as opaque byte strings; a codec maps the user's
//! value type to and from those bytes. Lengths are never stored next to the
//! value: the table layout recovers them from adjacent key-offset deltas and
//! hands them back to [`ValueCodec::read`].

use std::io::{self, Read, Write};

/// Deterministic value encoding.
///
/// Contract: `write` emits exactly `encoded_size(v)` bytes, `read` consumes
/// exactly `len` bytes, and `read(write(v))` is identity on the set of
/// representable values. A codec may encode an internal length field, but
/// must not require an external one.
pub trait ValueCodec {
    type Value;

    /// Encoded length in bytes; constant for the same value.
    fn encoded_size(value: &Self::Value) -> u32;

    /// Writes exactly [`encoded_size`](ValueCodec::encoded_size) bytes.
    fn write<W: Write>(w: &mut W, value: &Self::Value) -> io::Result<()>;

    /// Consumes exactly `len` bytes and reconstructs the value.
    fn read<R: Read>(r: &mut R, len: u32) -> io::Result<Self::Value>;

    /// Encodes into a fresh buffer.
    fn encode(value: &Self::Value) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::encoded_size(value) as usize);
        Self::write(&mut buf, value)?;
        Ok(buf)
    }

    /// Decodes an entire buffer.
    fn decode(bytes: &[u8]) -> io::Result<Self::Value> {
        let mut r = bytes;
        Self::read(&mut r, bytes.len() as u32)
    }
}

/// The default codec: values are already bytes, encoding is identity.
pub struct RawBytes;

impl ValueCodec for RawBytes {
    type Value = Vec<u8>;

    fn encoded_size(value: &Vec<u8>) -> u32 {
        value.len() as u32
    }

    fn write<W: Write>(w: &mut W, value: &Vec<u8>) -> io::Result<()> {
        w.write_all(value)
    }

    fn read<R: Read>(r: &mut R, len: u32) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        r.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// String values stored as their UTF-8 bytes, no internal length field.
///
/// Decoding rejects byte sequences that are not valid UTF-8, which can only
/// happen on a corrupted value region.
pub struct Utf8;

impl ValueCodec for Utf8 {
    type Value = String;

    fn encoded_size(value: &String) -> u32 {
        value.len() as u32
    }

    fn write<W: Write>(w: &mut W, value: &String) -> io::Result<()> {
        w.write_all(value.as_bytes())
    }

    fn read<R: Read>(r: &mut R, len: u32) -> io::Result<String> {
        let mut buf = vec![0u8; len as usize];
        r.read_exact(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
