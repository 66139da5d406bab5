//! Byte spans and the reusable accumulation buffer.
//!
//! A [`ByteSpan`] is an immutable, reference-counted view over a byte
//! buffer. Cloning and slicing are zero-copy; the underlying storage is
//! shared and freed when the last span referring to it is dropped.
//!
//! A [`DataBuffer`] is the growable buffer the chunk readers accumulate
//! into while scanning for separators. It grows geometrically, can be
//! reset without releasing its storage, and snapshots its contents into a
//! [`ByteSpan`] when a chunk boundary is reached.

use crate::error::{MarcError, Result};
use bytes::Bytes;
use encoding_rs::Encoding;

/// An immutable, cheaply cloneable view over a byte buffer.
///
/// # Examples
///
/// ```
/// use marcwire::ByteSpan;
///
/// let span = ByteSpan::from_slice(b"245 10");
/// assert_eq!(span.len(), 6);
/// assert_eq!(span.byte_at(0), Some(b'2'));
///
/// let tag = span.slice(0, 3)?;
/// assert_eq!(tag.as_bytes(), b"245");
/// # Ok::<(), marcwire::MarcError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteSpan {
    data: Bytes,
}

impl ByteSpan {
    /// Create a span owning the given bytes.
    #[must_use]
    pub fn new(data: Bytes) -> Self {
        ByteSpan { data }
    }

    /// Create a span by copying a slice.
    #[must_use]
    pub fn from_slice(data: &[u8]) -> Self {
        ByteSpan {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Length of the view in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte at `index`, or `None` past the end of the view.
    #[must_use]
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Position of the first occurrence of `byte` at or after `from`.
    #[must_use]
    pub fn index_of(&self, byte: u8, from: usize) -> Option<usize> {
        if from >= self.data.len() {
            return None;
        }
        memchr::memchr(byte, &self.data[from..]).map(|i| from + i)
    }

    /// Zero-copy sub-view of `length` bytes starting at `from`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::OutOfRange`] if `from + length` exceeds the view.
    pub fn slice(&self, from: usize, length: usize) -> Result<ByteSpan> {
        let end = from
            .checked_add(length)
            .ok_or_else(|| MarcError::OutOfRange(format!("{from} + {length} overflows")))?;
        if end > self.data.len() {
            return Err(MarcError::OutOfRange(format!(
                "slice {from}..{end} exceeds span of {} bytes",
                self.data.len()
            )));
        }
        Ok(ByteSpan {
            data: self.data.slice(from..end),
        })
    }

    /// The viewed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy the viewed bytes into an owned vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Decode the viewed bytes with the given character encoding.
    ///
    /// Malformed sequences are replaced with U+FFFD, matching the decoding
    /// behavior of the record generator.
    #[must_use]
    pub fn decode(&self, encoding: &'static Encoding) -> String {
        let (decoded, _, _) = encoding.decode(&self.data);
        decoded.into_owned()
    }

    /// Decode the viewed bytes as UTF-8, replacing malformed sequences.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl From<Vec<u8>> for ByteSpan {
    fn from(data: Vec<u8>) -> Self {
        ByteSpan { data: data.into() }
    }
}

impl AsRef<[u8]> for ByteSpan {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Initial capacity for a fresh [`DataBuffer`].
const INITIAL_CAPACITY: usize = 256;

/// Growable accumulation buffer with storage reuse across records.
///
/// Growth doubles the current capacity and adds ~12.5% headroom, keeping
/// append amortized O(1) while leaving slack for the separator scan that
/// typically follows a fill.
#[derive(Debug, Default)]
pub struct DataBuffer {
    data: Vec<u8>,
}

impl DataBuffer {
    /// Create an empty buffer with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        DataBuffer {
            data: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Number of accumulated bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no bytes have been accumulated since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current storage capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Append a single byte.
    pub fn push(&mut self, byte: u8) {
        self.ensure(1);
        self.data.push(byte);
    }

    /// Append a slice of bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.data.extend_from_slice(bytes);
    }

    /// Clear the accumulated bytes, keeping the storage for reuse.
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Snapshot the accumulated bytes into a [`ByteSpan`] and reset.
    #[must_use]
    pub fn take_span(&mut self) -> ByteSpan {
        let span = ByteSpan::from_slice(&self.data);
        self.data.clear();
        span
    }

    /// Grow the storage so that `additional` more bytes fit.
    fn ensure(&mut self, additional: usize) {
        let needed = self.data.len() + additional;
        let capacity = self.data.capacity();
        if needed > capacity {
            let grown = capacity * 2 + capacity / 8;
            let target = grown.max(needed).max(INITIAL_CAPACITY);
            self.data.reserve_exact(target - self.data.len());
        }
    }
}
