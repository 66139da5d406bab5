//! The inverse encoder: fields back to separator-delimited bytes.
//!
//! The wire layout written here is the directory-less dual of what the
//! generator reads: the 24-byte leader terminated by the field separator,
//! each field terminated by the field separator (control fields as
//! `tag value`, data fields as `tag indicator` plus one subfield-delimited
//! `id value` span per non-empty subfield), each record terminated by the
//! record separator, and the stream terminated by the file separator.
//! Decoding an encoded stream reproduces the original event sequence.
//!
//! # Concurrency
//!
//! A [`MarcWriter`] guards its output with one mutex, acquired for the
//! duration of a whole record: [`MarcWriter::write_record`] locks once per
//! record, and [`MarcWriter::begin_record`] returns an RAII [`RecordSink`]
//! holding the guard until the record ends. Multiple producer threads may
//! interleave whole records but never partial ones. Fields need no locking
//! of their own because a field is always fully built before it reaches
//! the encoder.

use crate::chunk::{FIELD_TERMINATOR, FILE_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER};
use crate::error::{MarcError, Result};
use crate::generator::ErrorMode;
use crate::leader::Leader;
use crate::listener::MarcListener;
use crate::record::{Field, Record, RecordFormat, RecordKind};
use encoding_rs::Encoding;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Serialize one record to the wire layout, encoding values as UTF-8.
pub fn encode_record(record: &Record, out: &mut Vec<u8>) {
    encode_record_with(record, encoding_rs::UTF_8, out);
}

/// Serialize one record to the wire layout with an explicit value
/// encoding.
pub fn encode_record_with(record: &Record, encoding: &'static Encoding, out: &mut Vec<u8>) {
    out.extend_from_slice(record.leader.as_bytes());
    out.push(FIELD_TERMINATOR);
    for field in &record.fields {
        encode_field_with(field, encoding, out);
    }
    out.push(RECORD_TERMINATOR);
}

/// Serialize one field, encoding values as UTF-8.
pub fn encode_field(field: &Field, out: &mut Vec<u8>) {
    encode_field_with(field, encoding_rs::UTF_8, out);
}

/// Serialize one field with an explicit value encoding.
///
/// Control fields are written only when their value is non-empty;
/// subfields are written only when non-empty.
pub fn encode_field_with(field: &Field, encoding: &'static Encoding, out: &mut Vec<u8>) {
    if field.is_control_field() {
        let Some(value) = field.value.as_deref().filter(|v| !v.is_empty()) else {
            return;
        };
        put(out, encoding, &field.tag);
        put(out, encoding, value);
        out.push(FIELD_TERMINATOR);
        return;
    }

    put(out, encoding, &field.tag);
    put(out, encoding, &field.indicator);
    if let Some(value) = field.value.as_deref().filter(|v| !v.is_empty()) {
        put(out, encoding, value);
    }
    for subfield in &field.subfields {
        if let Some(value) = subfield.value().filter(|v| !v.is_empty()) {
            out.push(SUBFIELD_DELIMITER);
            put(out, encoding, &subfield.id);
            put(out, encoding, value);
        }
    }
    out.push(FIELD_TERMINATOR);
}

fn put(out: &mut Vec<u8>, encoding: &'static Encoding, text: &str) {
    let (bytes, _, _) = encoding.encode(text);
    out.extend_from_slice(&bytes);
}

#[derive(Debug)]
struct WriterInner<W> {
    sink: W,
    records_written: usize,
    first_error: Option<MarcError>,
    finished: bool,
}

/// Writer for the separator-delimited binary MARC layout.
///
/// # Examples
///
/// ```
/// use marcwire::{Field, Leader, MarcWriter, Record};
///
/// let mut record = Record::new(Leader::default());
/// record.add_field(Field::control("001", "12345"));
///
/// let mut buffer = Vec::new();
/// {
///     let writer = MarcWriter::new(&mut buffer);
///     writer.write_record(&record)?;
///     writer.finish()?;
/// }
/// assert_eq!(*buffer.last().unwrap(), 0x1C);
/// # Ok::<(), marcwire::MarcError>(())
/// ```
pub struct MarcWriter<W: Write> {
    inner: Mutex<WriterInner<W>>,
    mode: ErrorMode,
    encoding: &'static Encoding,
}

impl<W: Write> std::fmt::Debug for MarcWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarcWriter")
            .field("mode", &self.mode)
            .field("encoding", &self.encoding.name())
            .finish_non_exhaustive()
    }
}

impl<W: Write> MarcWriter<W> {
    /// Create a writer with UTF-8 value encoding and fatal error mode.
    pub fn new(sink: W) -> Self {
        MarcWriter {
            inner: Mutex::new(WriterInner {
                sink,
                records_written: 0,
                first_error: None,
                finished: false,
            }),
            mode: ErrorMode::Fatal,
            encoding: encoding_rs::UTF_8,
        }
    }

    /// Set the error mode. In lenient mode the first error is captured and
    /// later records are still attempted; inspect it with
    /// [`take_error`](Self::take_error).
    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the character encoding applied to values on output.
    #[must_use]
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    fn lock(&self) -> MutexGuard<'_, WriterInner<W>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize and write one record under a single lock acquisition.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is finished, or — in fatal mode — if
    /// the underlying sink fails. In lenient mode sink failures are
    /// captured and the record is skipped.
    pub fn write_record(&self, record: &Record) -> Result<()> {
        let mut inner = self.lock();
        if inner.finished {
            return Err(MarcError::InvalidRecord(
                "cannot write to a finished writer".to_string(),
            ));
        }
        let mut buffer = Vec::new();
        encode_record_with(record, self.encoding, &mut buffer);
        deliver(&mut inner, &buffer, self.mode)
    }

    /// Start an event-style record, locking the writer until the returned
    /// sink is consumed by [`RecordSink::end_record`] or dropped
    /// (dropping discards the in-flight record).
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is already finished.
    pub fn begin_record(&self) -> Result<RecordSink<'_, W>> {
        let inner = self.lock();
        if inner.finished {
            return Err(MarcError::InvalidRecord(
                "cannot write to a finished writer".to_string(),
            ));
        }
        Ok(RecordSink {
            inner,
            buffer: Vec::new(),
            leader_written: false,
            mode: self.mode,
            encoding: self.encoding,
        })
    }

    /// Adapter implementing [`MarcListener`] over this writer, so the
    /// encoder can consume the generator's event sequence directly.
    pub fn listener(&self) -> WriterListener<'_, W> {
        WriterListener {
            writer: self,
            sink: None,
        }
    }

    /// Write the file terminator, flush, and refuse further records.
    ///
    /// # Errors
    ///
    /// Returns sink failures in fatal mode; captures them in lenient mode.
    pub fn finish(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.finished {
            return Ok(());
        }
        inner.finished = true;
        let outcome = inner
            .sink
            .write_all(&[FILE_TERMINATOR])
            .and_then(|()| inner.sink.flush());
        if let Err(e) = outcome {
            return match self.mode {
                ErrorMode::Fatal => Err(e.into()),
                ErrorMode::Lenient => {
                    if inner.first_error.is_none() {
                        inner.first_error = Some(e.into());
                    }
                    Ok(())
                },
            };
        }
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.lock().records_written
    }

    /// Whether a lenient-mode error has been captured.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.lock().first_error.is_some()
    }

    /// Remove and return the captured first error, if any.
    #[must_use]
    pub fn take_error(&self) -> Option<MarcError> {
        self.lock().first_error.take()
    }
}

fn deliver<W: Write>(inner: &mut WriterInner<W>, bytes: &[u8], mode: ErrorMode) -> Result<()> {
    if let Err(e) = inner.sink.write_all(bytes) {
        return match mode {
            ErrorMode::Fatal => Err(e.into()),
            ErrorMode::Lenient => {
                if inner.first_error.is_none() {
                    inner.first_error = Some(e.into());
                }
                Ok(())
            },
        };
    }
    inner.records_written += 1;
    Ok(())
}

/// RAII guard for one event-style record.
///
/// Holds the writer's lock for the whole `begin_record … end_record` span;
/// the record is buffered and written in one piece when the sink is
/// consumed.
#[derive(Debug)]
pub struct RecordSink<'a, W: Write> {
    inner: MutexGuard<'a, WriterInner<W>>,
    buffer: Vec<u8>,
    leader_written: bool,
    mode: ErrorMode,
    encoding: &'static Encoding,
}

impl<W: Write> RecordSink<'_, W> {
    /// Append the record's leader. Called once, before any field.
    pub fn leader(&mut self, leader: &Leader) {
        self.buffer.extend_from_slice(leader.as_bytes());
        self.buffer.push(FIELD_TERMINATOR);
        self.leader_written = true;
    }

    /// Append one field.
    pub fn field(&mut self, field: &Field) {
        if !self.leader_written {
            self.leader(&Leader::default());
        }
        encode_field_with(field, self.encoding, &mut self.buffer);
    }

    /// Terminate and deliver the record, consuming the sink and releasing
    /// the writer's lock.
    ///
    /// # Errors
    ///
    /// Returns sink failures in fatal mode; captures them in lenient mode.
    pub fn end_record(mut self) -> Result<()> {
        if !self.leader_written {
            self.leader(&Leader::default());
        }
        self.buffer.push(RECORD_TERMINATOR);
        let bytes = std::mem::take(&mut self.buffer);
        deliver(&mut self.inner, &bytes, self.mode)
    }
}

/// [`MarcListener`] adapter over a [`MarcWriter`].
///
/// `begin_record` opens a [`RecordSink`], `end_record` delivers it, and
/// `end_collection` finishes the writer (writing the file terminator).
#[derive(Debug)]
pub struct WriterListener<'a, W: Write> {
    writer: &'a MarcWriter<W>,
    sink: Option<RecordSink<'a, W>>,
}

impl<W: Write> MarcListener for WriterListener<'_, W> {
    fn begin_record(&mut self, _format: RecordFormat, _kind: RecordKind) -> Result<()> {
        // Release any abandoned sink before taking the lock again.
        self.sink = None;
        self.sink = Some(self.writer.begin_record()?);
        Ok(())
    }

    fn leader(&mut self, leader: &Leader) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.leader(leader);
        }
        Ok(())
    }

    fn field(&mut self, field: Field) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.field(&field);
        }
        Ok(())
    }

    fn end_record(&mut self) -> Result<()> {
        match self.sink.take() {
            Some(sink) => sink.end_record(),
            None => Ok(()),
        }
    }

    fn end_collection(&mut self) -> Result<()> {
        self.sink = None;
        self.writer.finish()
    }
}

/// Compression applied to each rotated output segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentCompression {
    /// Plain bytes.
    #[default]
    None,
    /// Gzip-compress each segment.
    Gzip,
}

/// Factory producing the sink for segment `index`.
pub type SinkFactory = Box<dyn FnMut(usize) -> std::io::Result<Box<dyn Write + Send>> + Send>;

struct SplitInner {
    factory: SinkFactory,
    records_per_sink: usize,
    compression: SegmentCompression,
    current: Option<Box<dyn Write + Send>>,
    next_segment: usize,
    in_segment: usize,
    records_written: usize,
    first_error: Option<MarcError>,
    finished: bool,
}

/// Writer that rotates across sequentially-numbered sinks after a fixed
/// number of records, optionally compressing each segment.
///
/// Every segment is a complete, file-terminated stream decodable on its
/// own. The same whole-record locking contract as [`MarcWriter`] applies.
///
/// # Examples
///
/// ```no_run
/// use marcwire::{Field, Leader, Record, SegmentCompression, SplitWriter};
/// use std::fs::File;
///
/// let writer = SplitWriter::new(
///     Box::new(|index| {
///         let file = File::create(format!("out-{index:04}.mrc"))?;
///         Ok(Box::new(file) as Box<dyn std::io::Write + Send>)
///     }),
///     1000,
/// )
/// .with_compression(SegmentCompression::Gzip);
///
/// let mut record = Record::new(Leader::default());
/// record.add_field(Field::control("001", "1"));
/// writer.write_record(&record)?;
/// writer.finish()?;
/// # Ok::<(), marcwire::MarcError>(())
/// ```
pub struct SplitWriter {
    inner: Mutex<SplitInner>,
    mode: ErrorMode,
    encoding: &'static Encoding,
}

impl std::fmt::Debug for SplitWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SplitWriter")
            .field("mode", &self.mode)
            .field("records_per_sink", &inner.records_per_sink)
            .field("compression", &inner.compression)
            .field("next_segment", &inner.next_segment)
            .finish_non_exhaustive()
    }
}

impl SplitWriter {
    /// Create a rotating writer. `records_per_sink` is clamped to at
    /// least 1.
    pub fn new(factory: SinkFactory, records_per_sink: usize) -> Self {
        SplitWriter {
            inner: Mutex::new(SplitInner {
                factory,
                records_per_sink: records_per_sink.max(1),
                compression: SegmentCompression::None,
                current: None,
                next_segment: 0,
                in_segment: 0,
                records_written: 0,
                first_error: None,
                finished: false,
            }),
            mode: ErrorMode::Fatal,
            encoding: encoding_rs::UTF_8,
        }
    }

    /// Set the per-segment compression.
    #[must_use]
    pub fn with_compression(self, compression: SegmentCompression) -> Self {
        self.lock().compression = compression;
        self
    }

    /// Set the error mode.
    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the character encoding applied to values on output.
    #[must_use]
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SplitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize and write one record, rotating to the next sink when the
    /// current segment is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is finished, or — in fatal mode — if
    /// the factory or the sink fails; lenient mode captures the first
    /// failure instead.
    pub fn write_record(&self, record: &Record) -> Result<()> {
        let mut inner = self.lock();
        if inner.finished {
            return Err(MarcError::InvalidRecord(
                "cannot write to a finished writer".to_string(),
            ));
        }

        if inner.current.is_none() {
            let index = inner.next_segment;
            let sink = match (inner.factory)(index) {
                Ok(sink) => sink,
                Err(e) => return self.report(&mut inner, e.into()),
            };
            inner.current = Some(match inner.compression {
                SegmentCompression::None => sink,
                SegmentCompression::Gzip => {
                    Box::new(GzEncoder::new(sink, Compression::default()))
                },
            });
            inner.next_segment += 1;
            inner.in_segment = 0;
        }

        let mut buffer = Vec::new();
        encode_record_with(record, self.encoding, &mut buffer);
        let outcome = inner
            .current
            .as_mut()
            .map(|sink| sink.write_all(&buffer))
            .unwrap_or(Ok(()));
        if let Err(e) = outcome {
            return self.report(&mut inner, e.into());
        }
        inner.records_written += 1;
        inner.in_segment += 1;

        if inner.in_segment >= inner.records_per_sink {
            if let Err(e) = close_segment(&mut inner) {
                return self.report(&mut inner, e.into());
            }
        }
        Ok(())
    }

    /// Close the current segment and refuse further records.
    ///
    /// # Errors
    ///
    /// Returns sink failures in fatal mode; captures them in lenient mode.
    pub fn finish(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.finished {
            return Ok(());
        }
        inner.finished = true;
        if let Err(e) = close_segment(&mut inner) {
            return self.report(&mut inner, e.into());
        }
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.lock().records_written
    }

    /// Whether a lenient-mode error has been captured.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.lock().first_error.is_some()
    }

    /// Remove and return the captured first error, if any.
    #[must_use]
    pub fn take_error(&self) -> Option<MarcError> {
        self.lock().first_error.take()
    }

    fn report(&self, inner: &mut SplitInner, error: MarcError) -> Result<()> {
        match self.mode {
            ErrorMode::Fatal => Err(error),
            ErrorMode::Lenient => {
                if inner.first_error.is_none() {
                    inner.first_error = Some(error);
                }
                Ok(())
            },
        }
    }
}

/// Terminate the open segment with the file terminator and flush it.
fn close_segment(inner: &mut SplitInner) -> std::io::Result<()> {
    if let Some(mut sink) = inner.current.take() {
        sink.write_all(&[FILE_TERMINATOR])?;
        sink.flush()?;
    }
    Ok(())
}
