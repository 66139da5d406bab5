//! Error types for MARC streaming operations.
//!
//! This module provides the [`MarcError`] type for all marcwire operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all marcwire operations.
///
/// Represents the error conditions that can occur while chunking, decoding,
/// or encoding MARC record streams.
#[derive(Error, Debug)]
pub enum MarcError {
    /// The directory block length is not a multiple of the entry width, or
    /// an entry's numeric fields cannot be parsed. Always fatal for the
    /// current record.
    #[error("Corrupt directory: {0}")]
    CorruptDirectory(String),

    /// A field terminator's byte offset has no matching directory entry,
    /// even after probing nearby offsets. Fatal unless lenient mode is
    /// enabled.
    #[error("No directory entry at or near offset {offset}")]
    OffsetNotFound {
        /// Byte offset of the field data within the record.
        offset: usize,
    },

    /// Error indicating an invalid leader or an out-of-range leader field.
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A span slice extends past the end of the underlying view.
    #[error("Range out of bounds: {0}")]
    OutOfRange(String),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
