//! Separator- and pattern-delimited chunk readers.
//!
//! ISO 2709 streams are delimited by four hierarchical control bytes. The
//! readers in this module split an unbounded byte source into [`Chunk`]s,
//! each carrying the span of bytes between two separators plus the kind of
//! the separator that *preceded* the span.
//!
//! The preceding-separator tag is deliberately one step behind the data it
//! labels: "what ended the previous chunk" is exactly what the record
//! generator needs to interpret the current chunk's bytes. See
//! [`RecordGenerator`](crate::generator::RecordGenerator).
//!
//! # Example
//!
//! ```
//! use marcwire::{ChunkRead, SeparatorChunkReader, SeparatorKind};
//! use std::io::Cursor;
//!
//! let data = b"one\x1ftwo\x1ethree";
//! let mut reader = SeparatorChunkReader::new(Cursor::new(data.to_vec()));
//!
//! let first = reader.read_chunk()?.unwrap();
//! assert_eq!(first.kind, SeparatorKind::File); // nothing consumed yet
//! assert_eq!(first.data.as_bytes(), b"one");
//!
//! let second = reader.read_chunk()?.unwrap();
//! assert_eq!(second.kind, SeparatorKind::Subfield);
//! assert_eq!(second.data.as_bytes(), b"two");
//! # Ok::<(), marcwire::MarcError>(())
//! ```

use crate::error::{MarcError, Result};
use crate::span::{ByteSpan, DataBuffer};
use std::io::Read;

/// Subfield delimiter byte (US).
pub const SUBFIELD_DELIMITER: u8 = 0x1F;
/// Field terminator byte (RS).
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Record terminator byte (GS).
pub const RECORD_TERMINATOR: u8 = 0x1D;
/// File terminator byte (FS).
pub const FILE_TERMINATOR: u8 = 0x1C;

/// Default fill-buffer size for the chunk readers.
const DEFAULT_FILL_CAPACITY: usize = 8192;

/// The four hierarchical ISO 2709 separators, ranked low to high.
///
/// `File` doubles as the sentinel tag of the first chunk of a stream,
/// meaning "nothing consumed yet": the bytes that follow a file boundary
/// are the start of a record, exactly as at stream start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeparatorKind {
    /// Subfield delimiter (US, 0x1F).
    Subfield,
    /// Field terminator (RS, 0x1E).
    Field,
    /// Record terminator (GS, 0x1D).
    Record,
    /// File terminator (FS, 0x1C); also the start-of-stream sentinel.
    File,
}

impl SeparatorKind {
    /// The wire byte for this separator.
    #[must_use]
    pub fn byte(self) -> u8 {
        match self {
            SeparatorKind::Subfield => SUBFIELD_DELIMITER,
            SeparatorKind::Field => FIELD_TERMINATOR,
            SeparatorKind::Record => RECORD_TERMINATOR,
            SeparatorKind::File => FILE_TERMINATOR,
        }
    }

    /// Classify a wire byte, or `None` for non-separator bytes.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<SeparatorKind> {
        match byte {
            SUBFIELD_DELIMITER => Some(SeparatorKind::Subfield),
            FIELD_TERMINATOR => Some(SeparatorKind::Field),
            RECORD_TERMINATOR => Some(SeparatorKind::Record),
            FILE_TERMINATOR => Some(SeparatorKind::File),
            _ => None,
        }
    }
}

impl std::fmt::Display for SeparatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SeparatorKind::Subfield => "subfield delimiter",
            SeparatorKind::Field => "field terminator",
            SeparatorKind::Record => "record terminator",
            SeparatorKind::File => "file terminator",
        };
        f.write_str(name)
    }
}

/// One separator-delimited span of bytes.
///
/// `kind` names the separator that ended the *previous* chunk, which is the
/// information needed to interpret this chunk's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Kind of the separator that preceded `data`.
    pub kind: SeparatorKind,
    /// The bytes between the preceding separator and the next one.
    pub data: ByteSpan,
}

/// Pull interface shared by the chunk reader strategies.
pub trait ChunkRead {
    /// Read the next chunk, or `None` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the underlying source fails.
    fn read_chunk(&mut self) -> Result<Option<Chunk>>;

    /// Consume the reader into a finite, non-restartable chunk iterator.
    fn chunks(self) -> Chunks<Self>
    where
        Self: Sized,
    {
        Chunks {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over the chunks of a [`ChunkRead`] source.
///
/// Yields `Err` at most once; iteration ends after the first error or the
/// end of the source.
#[derive(Debug)]
pub struct Chunks<C: ChunkRead> {
    reader: C,
    done: bool,
}

impl<C: ChunkRead> Iterator for Chunks<C> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

/// Chunk reader splitting on the four single-byte ISO 2709 separators.
///
/// Maintains one lagging separator kind, initialized to the
/// [`SeparatorKind::File`] sentinel. Each call accumulates bytes until a
/// separator is found, emits them tagged with the kind captured *before*
/// the scan, then remembers the separator just found as the tag for the
/// next chunk. At end of input, leftover bytes are emitted as one final
/// chunk under the current lagging tag.
///
/// A separator is a single byte, so a match can never straddle a
/// fill-buffer boundary; bytes scanned without a match are moved into the
/// holding buffer before the next fill, so no data is lost across fills.
#[derive(Debug)]
pub struct SeparatorChunkReader<R: Read> {
    source: R,
    fill: Vec<u8>,
    fill_pos: usize,
    fill_len: usize,
    pending: DataBuffer,
    last_kind: SeparatorKind,
    finished: bool,
}

impl<R: Read> SeparatorChunkReader<R> {
    /// Create a reader with the default fill-buffer size.
    pub fn new(source: R) -> Self {
        Self::with_fill_capacity(source, DEFAULT_FILL_CAPACITY)
    }

    /// Create a reader with an explicit fill-buffer size.
    ///
    /// Small sizes (down to a single byte) are valid and exercised by the
    /// boundary tests; they only affect how often the source is read.
    pub fn with_fill_capacity(source: R, capacity: usize) -> Self {
        SeparatorChunkReader {
            source,
            fill: vec![0u8; capacity.max(1)],
            fill_pos: 0,
            fill_len: 0,
            pending: DataBuffer::new(),
            last_kind: SeparatorKind::File,
            finished: false,
        }
    }

    /// Locate the first separator byte in `window`.
    fn find_separator(window: &[u8]) -> Option<(usize, SeparatorKind)> {
        // The three high separators are contiguous; FS is scanned separately.
        let high = memchr::memchr3(
            RECORD_TERMINATOR,
            FIELD_TERMINATOR,
            SUBFIELD_DELIMITER,
            window,
        );
        let file = memchr::memchr(FILE_TERMINATOR, window);
        let position = match (high, file) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };
        SeparatorKind::from_byte(window[position]).map(|kind| (position, kind))
    }
}

impl<R: Read> ChunkRead for SeparatorChunkReader<R> {
    fn read_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            let window = &self.fill[self.fill_pos..self.fill_len];
            if let Some((index, found)) = Self::find_separator(window) {
                self.pending.extend_from_slice(&window[..index]);
                self.fill_pos += index + 1;
                let tag = self.last_kind;
                self.last_kind = found;
                return Ok(Some(Chunk {
                    kind: tag,
                    data: self.pending.take_span(),
                }));
            }

            self.pending.extend_from_slice(window);
            self.fill_pos = self.fill_len;

            let filled = loop {
                match self.source.read(&mut self.fill) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
                    Err(e) => return Err(MarcError::Io(e)),
                }
            };
            if filled == 0 {
                self.finished = true;
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(Chunk {
                    kind: self.last_kind,
                    data: self.pending.take_span(),
                }));
            }
            self.fill_pos = 0;
            self.fill_len = filled;
        }
    }
}

/// Chunk reader splitting on an arbitrary multi-byte delimiter pattern.
///
/// Same contract as [`SeparatorChunkReader`], for dialects framed by a byte
/// sequence such as CRLF instead of a control byte. A rolling match counter
/// carries partial matches across fill boundaries; a partial match followed
/// by a mismatch resets only the counter, feeding the no-longer-matching
/// prefix back into the chunk data.
///
/// Every matched delimiter is stamped with the `kind` chosen at
/// construction (line-oriented dialects use [`SeparatorKind::Field`]); the
/// first chunk carries the [`SeparatorKind::File`] sentinel.
pub struct PatternChunkReader<R: Read> {
    source: R,
    fill: Vec<u8>,
    fill_pos: usize,
    fill_len: usize,
    pattern: Vec<u8>,
    failure: Vec<usize>,
    matched: usize,
    pending: DataBuffer,
    last_kind: SeparatorKind,
    kind_on_match: SeparatorKind,
    finished: bool,
}

impl<R: Read> std::fmt::Debug for PatternChunkReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternChunkReader")
            .field("pattern", &self.pattern)
            .field("matched", &self.matched)
            .field("kind_on_match", &self.kind_on_match)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<R: Read> PatternChunkReader<R> {
    /// Create a reader splitting on `pattern`, stamping matched chunks with
    /// `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidRecord`] if the pattern is empty.
    pub fn new(source: R, pattern: impl Into<Vec<u8>>, kind: SeparatorKind) -> Result<Self> {
        Self::with_fill_capacity(source, pattern, kind, DEFAULT_FILL_CAPACITY)
    }

    /// Create a reader with an explicit fill-buffer size.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidRecord`] if the pattern is empty.
    pub fn with_fill_capacity(
        source: R,
        pattern: impl Into<Vec<u8>>,
        kind: SeparatorKind,
        capacity: usize,
    ) -> Result<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(MarcError::InvalidRecord(
                "delimiter pattern must not be empty".to_string(),
            ));
        }
        let failure = failure_table(&pattern);
        Ok(PatternChunkReader {
            source,
            fill: vec![0u8; capacity.max(1)],
            fill_pos: 0,
            fill_len: 0,
            pattern,
            failure,
            matched: 0,
            pending: DataBuffer::new(),
            last_kind: SeparatorKind::File,
            kind_on_match: kind,
            finished: false,
        })
    }

    /// Advance the rolling matcher by one byte.
    ///
    /// Returns true when the byte completes a full pattern match. Bytes
    /// ruled out of a partial match are flushed into the pending buffer.
    fn feed(&mut self, byte: u8) -> bool {
        loop {
            if byte == self.pattern[self.matched] {
                self.matched += 1;
                if self.matched == self.pattern.len() {
                    self.matched = 0;
                    return true;
                }
                return false;
            }
            if self.matched == 0 {
                self.pending.push(byte);
                return false;
            }
            // Keep the longest pattern prefix that is still a suffix of the
            // matched text; everything before it is confirmed data.
            let keep = self.failure[self.matched - 1];
            let surplus = self.matched - keep;
            self.pending.extend_from_slice(&self.pattern[..surplus]);
            self.matched = keep;
        }
    }
}

impl<R: Read> ChunkRead for PatternChunkReader<R> {
    fn read_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            while self.fill_pos < self.fill_len {
                let byte = self.fill[self.fill_pos];
                self.fill_pos += 1;
                if self.feed(byte) {
                    let tag = self.last_kind;
                    self.last_kind = self.kind_on_match;
                    return Ok(Some(Chunk {
                        kind: tag,
                        data: self.pending.take_span(),
                    }));
                }
            }

            let filled = loop {
                match self.source.read(&mut self.fill) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
                    Err(e) => return Err(MarcError::Io(e)),
                }
            };
            if filled == 0 {
                self.finished = true;
                if self.matched > 0 {
                    // A partial match at end of input is plain data.
                    self.pending.extend_from_slice(&self.pattern[..self.matched]);
                    self.matched = 0;
                }
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(Chunk {
                    kind: self.last_kind,
                    data: self.pending.take_span(),
                }));
            }
            self.fill_pos = 0;
            self.fill_len = filled;
        }
    }
}

/// KMP failure table: `table[i]` is the length of the longest proper prefix
/// of `pattern[..=i]` that is also a suffix of it.
fn failure_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0usize; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = table[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}
