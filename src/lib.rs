#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # marcwire: streaming ISO 2709 codec
//!
//! marcwire decodes and encodes the ISO 2709 "MARC" binary record family —
//! leader, directory, and variable fields delimited by four hierarchical
//! control-character separators — exposing the decoded structure either as
//! a stream of record events or as materialized [`Record`] values.
//!
//! ## Architecture
//!
//! Bytes flow through three layers:
//!
//! 1. A chunk reader ([`SeparatorChunkReader`] or [`PatternChunkReader`])
//!    splits the input into [`Chunk`]s, each tagged with the separator
//!    that preceded its bytes.
//! 2. The [`RecordGenerator`] state machine interprets chunks — leader,
//!    directory, fields, subfields — and emits the six [`MarcListener`]
//!    callbacks.
//! 3. A sink consumes the events: [`RecordCollector`] materializes
//!    records, [`EventCollector`] captures tagged event values, and a
//!    [`MarcWriter`] listener re-encodes the stream.
//!
//! [`MarcReader`] bundles the first two layers behind a pull-style
//! `read_record` surface for the common case.
//!
//! ## Modules
//!
//! - [`span`] — byte spans and the reusable accumulation buffer
//! - [`chunk`] — separator- and pattern-delimited chunk readers
//! - [`leader`] — the 24-character leader codec
//! - [`directory`] — directory decoding and offset lookup
//! - [`record`] — `Record`, `Field`, `Subfield` and builders
//! - [`validation`] — strict and permissive validators
//! - [`listener`] — the record event interface and built-in sinks
//! - [`generator`] — the chunk-driven record generator
//! - [`reader`] — pull-style record reading
//! - [`writer`] — the inverse encoder with rotating sinks
//! - [`error`] — error types and the crate `Result` alias

pub mod chunk;
pub mod directory;
pub mod error;
pub mod generator;
pub mod leader;
pub mod listener;
pub mod reader;
/// Core record structures (`Record`, `Field`, `Subfield`).
pub mod record;
pub mod span;
pub mod validation;
pub mod writer;

pub use chunk::{
    Chunk, ChunkRead, Chunks, PatternChunkReader, SeparatorChunkReader, SeparatorKind,
};
pub use directory::{Directory, DirectoryEntry};
pub use error::{MarcError, Result};
pub use generator::{
    DefaultFraming, ErrorMode, FieldFraming, InlineField, InlineSubfield, RecordGenerator,
};
pub use leader::{Leader, LeaderBuilder};
pub use listener::{EventCollector, MarcEvent, MarcListener, RecordCollector};
pub use reader::MarcReader;
pub use record::{
    Field, FieldBuilder, FieldLookup, Record, RecordFormat, RecordKind, RecordLookup, Subfield,
};
pub use span::{ByteSpan, DataBuffer};
pub use validation::{MarcValidator, PermissiveValidator, StrictValidator};
pub use writer::{
    encode_field, encode_record, MarcWriter, RecordSink, SegmentCompression, SinkFactory,
    SplitWriter, WriterListener,
};
