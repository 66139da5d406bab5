//! Pull-style record reading.
//!
//! [`MarcReader`] wires a [`SeparatorChunkReader`], a [`RecordGenerator`],
//! and a [`RecordCollector`] together behind the familiar one-record-at-a-
//! time surface.
//!
//! # Examples
//!
//! ```no_run
//! use marcwire::MarcReader;
//! use std::fs::File;
//!
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(file);
//!
//! while let Some(record) = reader.read_record()? {
//!     println!("{} fields", record.fields.len());
//! }
//! # Ok::<(), marcwire::MarcError>(())
//! ```

use crate::chunk::{ChunkRead, SeparatorChunkReader};
use crate::error::Result;
use crate::generator::{ErrorMode, RecordGenerator};
use crate::listener::RecordCollector;
use crate::record::{Record, RecordFormat};
use crate::validation::MarcValidator;
use encoding_rs::Encoding;
use std::io::Read;
use std::sync::Arc;

/// Reader for separator-delimited binary MARC streams.
///
/// `MarcReader` reads one record at a time from any source implementing
/// [`std::io::Read`]. Records are fully decoded and returned as [`Record`]
/// instances.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    chunks: SeparatorChunkReader<R>,
    generator: RecordGenerator,
    collector: RecordCollector,
    records_read: usize,
    begun: bool,
    exhausted: bool,
}

impl<R: Read> MarcReader<R> {
    /// Create a reader with default configuration: UTF-8 decoding, fatal
    /// error mode, strict validation.
    pub fn new(source: R) -> Self {
        Self::with_generator(source, RecordGenerator::new())
    }

    /// Create a reader around a pre-configured generator.
    pub fn with_generator(source: R, generator: RecordGenerator) -> Self {
        MarcReader {
            chunks: SeparatorChunkReader::new(source),
            generator,
            collector: RecordCollector::new(),
            records_read: 0,
            begun: false,
            exhausted: false,
        }
    }

    /// Set the error mode.
    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.generator = self.generator.with_error_mode(mode);
        self
    }

    /// Set the character encoding used to decode values.
    #[must_use]
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.generator = self.generator.with_encoding(encoding);
        self
    }

    /// Set the validation policy.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn MarcValidator>) -> Self {
        self.generator = self.generator.with_validator(validator);
        self
    }

    /// Set the format label stamped on decoded records.
    #[must_use]
    pub fn with_format(mut self, format: RecordFormat) -> Self {
        self.generator = self.generator.with_format(format);
        self
    }

    /// Read a single record.
    ///
    /// Returns `Ok(Some(record))` while records remain, `Ok(None)` at end
    /// of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed (subject to the error
    /// mode) or an I/O error occurs.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.collector.pop_front() {
                self.records_read += 1;
                return Ok(Some(record));
            }
            if self.exhausted {
                return Ok(None);
            }
            if !self.begun {
                self.generator.begin(&mut self.collector)?;
                self.begun = true;
            }
            match self.chunks.read_chunk()? {
                Some(chunk) => self.generator.handle_chunk(&chunk, &mut self.collector)?,
                None => {
                    self.exhausted = true;
                    self.generator.flush(&mut self.collector)?;
                    self.generator.end(&mut self.collector)?;
                },
            }
        }
    }

    /// Read all remaining records into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; records read before it are
    /// discarded.
    pub fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Number of records returned so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Iterate over the remaining records.
    pub fn records(&mut self) -> Records<'_, R> {
        Records { reader: self }
    }
}

/// Iterator returned by [`MarcReader::records`].
#[derive(Debug)]
pub struct Records<'a, R: Read> {
    reader: &'a mut MarcReader<R>,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const RS: u8 = 0x1E;
    const GS: u8 = 0x1D;
    const FS: u8 = 0x1C;
    const US: u8 = 0x1F;

    fn sample_record(id: &str) -> Vec<u8> {
        let body_001 = id.as_bytes();
        let mut body_245 = Vec::new();
        body_245.extend_from_slice(b"10");
        body_245.push(US);
        body_245.extend_from_slice(b"aTest title");

        let mut directory = String::new();
        let len_001 = body_001.len() + 1;
        let len_245 = body_245.len() + 1;
        directory.push_str(&format!("001{len_001:04}00000"));
        directory.push_str(&format!("245{len_245:04}{len_001:05}"));

        let base = 24 + directory.len() + 1;
        let total = base + len_001 + len_245 + 1;

        let mut wire = Vec::new();
        wire.extend_from_slice(format!("{total:05}nam a22{base:05} a 4500").as_bytes());
        wire.extend_from_slice(directory.as_bytes());
        wire.push(RS);
        wire.extend_from_slice(body_001);
        wire.push(RS);
        wire.extend_from_slice(&body_245);
        wire.push(RS);
        wire.push(GS);
        wire
    }

    #[test]
    fn test_read_simple_record() {
        let mut reader = MarcReader::new(Cursor::new(sample_record("12345")));
        let record = reader.read_record().unwrap().unwrap();

        assert_eq!(record.leader.record_type(), 'a');
        assert_eq!(record.control_field("001"), Some("12345"));
        let field = record.get_field("245").unwrap();
        assert_eq!(field.indicator, "10");
        assert_eq!(field.subfield("a"), Some("Test title"));

        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 1);
    }

    #[test]
    fn test_eof_returns_none() {
        let mut reader = MarcReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_record().unwrap().is_none());
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_read_multiple_records() {
        let mut wire = sample_record("one");
        wire.extend_from_slice(&sample_record("two"));
        wire.push(FS);

        let mut reader = MarcReader::new(Cursor::new(wire));
        let first = reader.read_record().unwrap().unwrap();
        assert_eq!(first.control_field("001"), Some("one"));
        let second = reader.read_record().unwrap().unwrap();
        assert_eq!(second.control_field("001"), Some("two"));
        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn test_records_iterator() {
        let mut wire = sample_record("one");
        wire.extend_from_slice(&sample_record("two"));
        wire.extend_from_slice(&sample_record("three"));

        let mut reader = MarcReader::new(Cursor::new(wire));
        let count = reader.records().map(std::result::Result::unwrap).count();
        assert_eq!(count, 3);
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_read_all() {
        let mut wire = sample_record("one");
        wire.extend_from_slice(&sample_record("two"));

        let mut reader = MarcReader::new(Cursor::new(wire));
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
    }
}
