//! The chunk-driven record generator.
//!
//! [`RecordGenerator`] consumes [`Chunk`]s and emits record events to a
//! [`MarcListener`]. Dispatch runs off the separator kind carried by each
//! chunk — the kind of the separator that *preceded* the chunk's bytes,
//! which names what kind of element the bytes begin:
//!
//! - `File` sentinel (stream start, or right after a file terminator):
//!   the bytes are a record's first segment — leader plus directory. With
//!   an empty directory, the remainder of the segment is the first field,
//!   tag/indicator/value-prefixed inline.
//! - `Record`: the previous record is finalized, then the bytes start the
//!   next record's first segment.
//! - `Field`: the previous field is finalized and emitted; the bytes start
//!   a new field — inline-framed without a directory, or looked up by byte
//!   offset in the directory, probing nearby offsets for slightly corrupt
//!   producers.
//! - `Subfield`: the bytes are one more id+value pair for the in-progress
//!   field.
//! - Empty chunk data is an explicit flush signal: pending field and
//!   record are finalized.
//!
//! The machine is single-threaded, synchronous, and pull-based. Per-record
//! state (leader, directory, byte position, field builder) is replaced
//! wholesale at record boundaries, and the field builder is moved into
//! every finalize, never shared.

use crate::chunk::{Chunk, ChunkRead};
use crate::directory::Directory;
use crate::error::{MarcError, Result};
use crate::leader::{Leader, LEADER_LENGTH};
use crate::listener::MarcListener;
use crate::record::{Field, FieldBuilder, RecordFormat, RecordKind};
use crate::span::ByteSpan;
use crate::validation::{MarcValidator, StrictValidator};
use encoding_rs::Encoding;
use std::sync::Arc;

/// How the generator reacts to recoverable decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Raise on the first failure (default).
    #[default]
    Fatal,
    /// Skip what cannot be decoded and continue.
    Lenient,
}

/// Sliced parts of an inline field: tag, indicator, and value bytes.
#[derive(Debug, Clone, Copy)]
pub struct InlineField<'a> {
    /// Tag bytes.
    pub tag: &'a [u8],
    /// Indicator bytes; empty for control fields.
    pub indicator: &'a [u8],
    /// Value bytes; may be empty.
    pub value: &'a [u8],
}

/// Sliced parts of a subfield chunk: identifier and value bytes.
#[derive(Debug, Clone, Copy)]
pub struct InlineSubfield<'a> {
    /// Identifier bytes.
    pub id: &'a [u8],
    /// Value bytes; may be empty.
    pub value: &'a [u8],
}

/// Hook that slices raw field and subfield bytes into their parts.
///
/// The default implementation follows ISO 2709 framing; formats whose
/// framing differs (for example variable-width subfield identifiers keyed
/// by tag and record type) supply their own.
pub trait FieldFraming: std::fmt::Debug {
    /// Slice an inline field (no directory) into tag, indicator, value.
    fn split_field<'a>(&self, leader: &Leader, bytes: &'a [u8]) -> InlineField<'a>;

    /// Slice a subfield chunk into identifier and value.
    fn split_subfield<'a>(&self, leader: &Leader, tag: &str, bytes: &'a [u8])
        -> InlineSubfield<'a>;
}

/// Indicator width from the leader, defaulting to the MARC-conventional 2
/// when position 10 is blank or non-numeric.
fn indicator_width(leader: &Leader) -> usize {
    match leader.as_bytes()[10] {
        b @ b'0'..=b'9' => usize::from(b - b'0'),
        _ => 2,
    }
}

/// Subfield identifier width from the leader (the code count includes the
/// delimiter itself), defaulting to 1 when position 11 is blank, zero, or
/// non-numeric.
fn subfield_id_width(leader: &Leader) -> usize {
    match leader.as_bytes()[11] {
        b @ b'2'..=b'9' => usize::from(b - b'0') - 1,
        _ => 1,
    }
}

/// ISO 2709 framing: 3-byte tags, `indicator_count` indicator bytes for
/// non-control fields, and `subfield_code_count - 1` identifier bytes per
/// subfield (the count includes the delimiter itself).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFraming;

impl FieldFraming for DefaultFraming {
    fn split_field<'a>(&self, leader: &Leader, bytes: &'a [u8]) -> InlineField<'a> {
        let tag_len = bytes.len().min(3);
        let (tag, rest) = bytes.split_at(tag_len);
        if tag.starts_with(b"00") {
            return InlineField {
                tag,
                indicator: &[],
                value: rest,
            };
        }
        let indicator_len = rest.len().min(indicator_width(leader));
        let (indicator, value) = rest.split_at(indicator_len);
        InlineField {
            tag,
            indicator,
            value,
        }
    }

    fn split_subfield<'a>(
        &self,
        leader: &Leader,
        _tag: &str,
        bytes: &'a [u8],
    ) -> InlineSubfield<'a> {
        let id_len = bytes.len().min(subfield_id_width(leader));
        let (id, value) = bytes.split_at(id_len);
        InlineSubfield { id, value }
    }
}

/// Field-level transformer: rewrites a finished field before it reaches
/// the listener.
pub type FieldTransformer = Box<dyn FnMut(Field) -> Field>;

/// Value-level transformer: rewrites one decoded field or subfield value,
/// given the owning field's tag.
pub type ValueTransformer = Box<dyn FnMut(&str, String) -> String>;

/// Leader fixer: repairs a parsed leader before it is used, without
/// altering the codec contract.
pub type LeaderFixer = Box<dyn Fn(Leader) -> Leader>;

/// The record generator state machine.
///
/// # Examples
///
/// ```
/// use marcwire::{RecordCollector, RecordGenerator, SeparatorChunkReader};
/// use std::io::Cursor;
///
/// // A directory-less record: blank leader, one control field, inline.
/// let mut wire = Vec::new();
/// wire.extend_from_slice(&[b' '; 24]);
/// wire.push(0x1E);
/// wire.extend_from_slice(b"00112345");
/// wire.extend_from_slice(&[0x1E, 0x1D, 0x1C]);
///
/// let mut generator = RecordGenerator::new();
/// let mut collector = RecordCollector::new();
/// generator.parse(SeparatorChunkReader::new(Cursor::new(wire)), &mut collector)?;
///
/// let records = collector.into_records();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].control_field("001"), Some("12345"));
/// # Ok::<(), marcwire::MarcError>(())
/// ```
pub struct RecordGenerator {
    format: RecordFormat,
    encoding: &'static Encoding,
    mode: ErrorMode,
    validator: Arc<dyn MarcValidator>,
    framing: Box<dyn FieldFraming>,
    leader_fixer: Option<LeaderFixer>,
    field_transformer: Option<FieldTransformer>,
    value_transformer: Option<ValueTransformer>,
    // Per-record state, replaced wholesale at record boundaries.
    leader: Leader,
    directory: Directory,
    pending: Option<FieldBuilder>,
    record_open: bool,
    collection_open: bool,
    position: usize,
}

impl std::fmt::Debug for RecordGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordGenerator")
            .field("format", &self.format)
            .field("encoding", &self.encoding.name())
            .field("mode", &self.mode)
            .field("record_open", &self.record_open)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl Default for RecordGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordGenerator {
    /// Create a generator with UTF-8 decoding, fatal error mode, and the
    /// strict validator.
    #[must_use]
    pub fn new() -> Self {
        RecordGenerator {
            format: RecordFormat::Marc21,
            encoding: encoding_rs::UTF_8,
            mode: ErrorMode::Fatal,
            validator: Arc::new(StrictValidator),
            framing: Box::new(DefaultFraming),
            leader_fixer: None,
            field_transformer: None,
            value_transformer: None,
            leader: Leader::default(),
            directory: Directory::default(),
            pending: None,
            record_open: false,
            collection_open: false,
            position: 0,
        }
    }

    /// Set the format label stamped on `begin_record` events.
    #[must_use]
    pub fn with_format(mut self, format: RecordFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the character encoding used to decode values.
    #[must_use]
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the error mode.
    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the validation policy consulted by field builders.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn MarcValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Override the field/subfield framing.
    #[must_use]
    pub fn with_framing(mut self, framing: Box<dyn FieldFraming>) -> Self {
        self.framing = framing;
        self
    }

    /// Install a leader fixer, applied to every parsed leader.
    #[must_use]
    pub fn with_leader_fixer(mut self, fixer: LeaderFixer) -> Self {
        self.leader_fixer = Some(fixer);
        self
    }

    /// Install a field-level transformer, applied before each `field`
    /// event.
    #[must_use]
    pub fn with_field_transformer(mut self, transformer: FieldTransformer) -> Self {
        self.field_transformer = Some(transformer);
        self
    }

    /// Install a value-level transformer, applied to each decoded field
    /// and subfield value.
    #[must_use]
    pub fn with_value_transformer(mut self, transformer: ValueTransformer) -> Self {
        self.value_transformer = Some(transformer);
        self
    }

    /// Drive a chunk source to exhaustion, emitting the full event stream
    /// including the collection bookends and the final flush.
    ///
    /// # Errors
    ///
    /// Propagates chunk-source I/O errors, [`MarcError::CorruptDirectory`]
    /// (always fatal for the current record), and — in fatal mode —
    /// [`MarcError::OffsetNotFound`] and field-structure errors.
    pub fn parse<C, L>(&mut self, mut source: C, listener: &mut L) -> Result<()>
    where
        C: ChunkRead,
        L: MarcListener,
    {
        self.begin(listener)?;
        while let Some(chunk) = source.read_chunk()? {
            self.handle_chunk(&chunk, listener)?;
        }
        self.flush(listener)?;
        self.end(listener)
    }

    /// Emit `begin_collection` once. Push-style drivers call this before
    /// the first chunk.
    ///
    /// # Errors
    ///
    /// Propagates listener failures.
    pub fn begin<L: MarcListener>(&mut self, listener: &mut L) -> Result<()> {
        if !self.collection_open {
            listener.begin_collection()?;
            self.collection_open = true;
        }
        Ok(())
    }

    /// Feed one chunk through the state machine.
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse).
    pub fn handle_chunk<L: MarcListener>(
        &mut self,
        chunk: &Chunk,
        listener: &mut L,
    ) -> Result<()> {
        use crate::chunk::SeparatorKind;

        if chunk.data.is_empty() {
            // An empty span is an explicit flush signal.
            self.finish_field(listener)?;
            self.finish_record(listener)?;
            self.position += 1;
            return Ok(());
        }

        match chunk.kind {
            SeparatorKind::File | SeparatorKind::Record => {
                self.finish_field(listener)?;
                self.finish_record(listener)?;
                self.start_record(&chunk.data, listener)?;
            },
            SeparatorKind::Field => {
                self.finish_field(listener)?;
                if !self.record_open {
                    if self.mode == ErrorMode::Fatal {
                        return Err(MarcError::InvalidRecord(
                            "field data before any record segment".to_string(),
                        ));
                    }
                } else {
                    self.start_field(&chunk.data)?;
                }
                self.position += chunk.data.len() + 1;
            },
            SeparatorKind::Subfield => {
                self.append_subfield(&chunk.data)?;
                self.position += chunk.data.len() + 1;
            },
        }
        Ok(())
    }

    /// Finalize a record lacking a terminating separator. Drivers call
    /// this after end of input.
    ///
    /// # Errors
    ///
    /// Propagates listener failures.
    pub fn flush<L: MarcListener>(&mut self, listener: &mut L) -> Result<()> {
        self.finish_field(listener)?;
        self.finish_record(listener)
    }

    /// Emit `end_collection` once. Push-style drivers call this after the
    /// final flush.
    ///
    /// # Errors
    ///
    /// Propagates listener failures.
    pub fn end<L: MarcListener>(&mut self, listener: &mut L) -> Result<()> {
        if self.collection_open {
            listener.end_collection()?;
            self.collection_open = false;
        }
        Ok(())
    }

    /// Parse a record's first segment: leader, directory, and — without a
    /// directory — the inline first field.
    fn start_record<L: MarcListener>(&mut self, data: &ByteSpan, listener: &mut L) -> Result<()> {
        let bytes = data.as_bytes();
        let mut leader = Leader::from_bytes_padded(&bytes[..bytes.len().min(LEADER_LENGTH)]);
        if let Some(fixer) = self.leader_fixer.as_ref() {
            leader = fixer(leader);
        }

        // A segment holding only the leader has no directory to decode,
        // whatever base address the leader announces; the encoder emits
        // exactly this shape.
        let directory = if bytes.len() <= LEADER_LENGTH {
            Directory::default()
        } else {
            Directory::decode(&leader, bytes)?
        };

        listener.begin_record(self.format, RecordKind::from_leader(&leader))?;
        listener.leader(&leader)?;
        self.record_open = true;
        self.leader = leader;
        self.position = 0;

        if directory.is_empty() && bytes.len() > LEADER_LENGTH {
            // No directory: the rest of the segment is the first field.
            self.directory = directory;
            self.start_field_inline(&bytes[LEADER_LENGTH..], LEADER_LENGTH)?;
        } else {
            self.directory = directory;
        }

        self.position = data.len() + 1;
        Ok(())
    }

    /// Begin a field from a `Field`-tagged chunk.
    fn start_field(&mut self, data: &ByteSpan) -> Result<()> {
        if self.directory.is_empty() {
            return self.start_field_inline(data.as_bytes(), self.position);
        }

        let Some(entry) = self.directory.probe(self.position) else {
            return match self.mode {
                ErrorMode::Fatal => Err(MarcError::OffsetNotFound {
                    offset: self.position,
                }),
                // Lenient mode drops this field's data; trailing subfield
                // chunks find no pending builder and are dropped too.
                ErrorMode::Lenient => Ok(()),
            };
        };

        let tag = entry.tag.clone();
        let bytes = data.as_bytes();
        let mut builder = FieldBuilder::new(Arc::clone(&self.validator));
        builder.tag(&tag);
        builder.position(self.position);
        builder.add_byte_length(bytes.len() + 1);

        if builder.current_tag().starts_with("00") {
            let value = self.decode_value(&tag, bytes);
            builder.value(value);
        } else {
            let indicator_len = bytes.len().min(indicator_width(&self.leader));
            let (indicator, inline_value) = bytes.split_at(indicator_len);
            builder.indicator(&self.decode_text(indicator));
            if !inline_value.is_empty() {
                let value = self.decode_value(&tag, inline_value);
                builder.value(value);
            }
        }

        self.pending = Some(builder);
        Ok(())
    }

    /// Begin a field from inline tag/indicator/value bytes.
    fn start_field_inline(&mut self, bytes: &[u8], position: usize) -> Result<()> {
        let parts = self.framing.split_field(&self.leader, bytes);
        let tag_text = self.decode_text(parts.tag);
        let indicator_text = self.decode_text(parts.indicator);

        let mut builder = FieldBuilder::new(Arc::clone(&self.validator));
        builder.tag(&tag_text);
        builder.position(position);
        builder.add_byte_length(bytes.len() + 1);
        if !parts.indicator.is_empty() {
            builder.indicator(&indicator_text);
        }
        if !parts.value.is_empty() {
            let value = self.decode_value(&tag_text, parts.value);
            builder.value(value);
        }

        self.pending = Some(builder);
        Ok(())
    }

    /// Append a subfield from a `Subfield`-tagged chunk.
    fn append_subfield(&mut self, data: &ByteSpan) -> Result<()> {
        if self.pending.is_none() {
            return match self.mode {
                ErrorMode::Fatal => Err(MarcError::InvalidField(
                    "subfield data with no field in progress".to_string(),
                )),
                ErrorMode::Lenient => Ok(()),
            };
        }

        let tag = self
            .pending
            .as_ref()
            .map(|b| b.current_tag().to_string())
            .unwrap_or_default();
        let bytes = data.as_bytes();
        let parts = self.framing.split_subfield(&self.leader, &tag, bytes);
        let id = self.decode_text(parts.id);
        let value = if parts.value.is_empty() {
            None
        } else {
            Some(self.decode_value(&tag, parts.value))
        };

        if let Some(builder) = self.pending.as_mut() {
            builder.subfield(&id, value);
            builder.add_byte_length(bytes.len() + 1);
        }
        Ok(())
    }

    /// Emit the pending field, if any. The builder is moved out and
    /// replaced; it can never be observed after the flush.
    fn finish_field<L: MarcListener>(&mut self, listener: &mut L) -> Result<()> {
        if let Some(builder) = self.pending.take() {
            let mut field = builder.build();
            if let Some(transformer) = self.field_transformer.as_mut() {
                field = transformer(field);
            }
            listener.field(field)?;
        }
        Ok(())
    }

    /// Emit `end_record` and drop the per-record state wholesale.
    fn finish_record<L: MarcListener>(&mut self, listener: &mut L) -> Result<()> {
        if self.record_open {
            listener.end_record()?;
            self.record_open = false;
            self.leader = Leader::default();
            self.directory = Directory::default();
            self.position = 0;
        }
        Ok(())
    }

    /// Decode structural text (tags, indicators, identifiers).
    fn decode_text(&self, bytes: &[u8]) -> String {
        let (decoded, _, _) = self.encoding.decode(bytes);
        decoded.into_owned()
    }

    /// Decode a field or subfield value and run the value transformer.
    fn decode_value(&mut self, tag: &str, bytes: &[u8]) -> String {
        let (decoded, _, _) = self.encoding.decode(bytes);
        let decoded = decoded.into_owned();
        match self.value_transformer.as_mut() {
            Some(transformer) => transformer(tag, decoded),
            None => decoded,
        }
    }
}
