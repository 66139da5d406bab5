//! Directory decoding and offset lookup.
//!
//! The directory is a block of fixed-width entries between the leader and
//! the variable-field data area, mapping each field to its tag, byte
//! length, and starting position. Entry widths come from the leader's
//! entry map (positions 20-22), so non-MARC21 layouts decode with the same
//! code path.
//!
//! Entries are keyed by the absolute byte offset of the field data within
//! the record (`base address + starting position`), which is what the
//! generator has in hand when a field terminator arrives. Directory state
//! is scoped to one record: the entry vector and its offset index are
//! dropped wholesale when the record ends.

use crate::error::{MarcError, Result};
use crate::leader::{Leader, LEADER_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Offsets probed, in order, when a field's exact byte offset has no
/// directory entry. Slight drift occurs in records whose directory was
/// computed under a different character encoding than the data was written
/// in; the bound of 4 matches observed corrupt producers.
const PROBE_OFFSETS: [isize; 8] = [1, -1, 2, -2, 3, -3, 4, -4];

/// One directory entry: a field's tag, byte length, and absolute offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Three-character field tag.
    pub tag: String,
    /// Length of the field data in bytes, including its terminator.
    pub length: usize,
    /// Byte offset of the field data from the start of the record
    /// (base address + starting character position).
    pub offset: usize,
}

/// Decoded directory for one record.
///
/// An empty directory is valid and signals that fields arrive
/// tag/indicator/value-prefixed inline rather than directory-addressed.
#[derive(Debug, Default)]
pub struct Directory {
    entries: Vec<DirectoryEntry>,
    by_offset: HashMap<usize, usize>,
}

impl Directory {
    /// Decode the directory from a record's first segment (leader +
    /// directory block, no separators inside).
    ///
    /// The directory block spans `base_address - 25` bytes starting at
    /// position 24; the 25 accounts for the leader and the separator that
    /// ends the first segment.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::CorruptDirectory`] when the block length is not
    /// an exact multiple of the entry width, when the segment is shorter
    /// than the block the leader announces, or when an entry's numeric
    /// fields are unparsable.
    pub fn decode(leader: &Leader, segment: &[u8]) -> Result<Self> {
        let base_address = leader.data_base_address() as usize;
        let directory_length = base_address.saturating_sub(LEADER_LENGTH + 1);
        if directory_length == 0 {
            return Ok(Directory::default());
        }

        let entry_width = 3
            + leader.data_field_length_width()
            + leader.starting_position_width()
            + leader.segment_identifier_width();
        if entry_width == 3 {
            return Err(MarcError::CorruptDirectory(
                "entry map declares zero-width length and position fields".to_string(),
            ));
        }
        if directory_length % entry_width != 0 {
            return Err(MarcError::CorruptDirectory(format!(
                "directory length {directory_length} is not a multiple of entry width {entry_width}"
            )));
        }
        if segment.len() < LEADER_LENGTH + directory_length {
            return Err(MarcError::CorruptDirectory(format!(
                "directory block truncated: expected {directory_length} bytes, got {}",
                segment.len().saturating_sub(LEADER_LENGTH)
            )));
        }

        let block = &segment[LEADER_LENGTH..LEADER_LENGTH + directory_length];
        let length_width = leader.data_field_length_width();
        let position_width = leader.starting_position_width();

        let mut entries = Vec::with_capacity(directory_length / entry_width);
        let mut by_offset = HashMap::with_capacity(directory_length / entry_width);
        for entry in block.chunks_exact(entry_width) {
            let tag = String::from_utf8_lossy(&entry[..3]).into_owned();
            let length = parse_digits(&entry[3..3 + length_width], &tag, "length")?;
            let start = parse_digits(
                &entry[3 + length_width..3 + length_width + position_width],
                &tag,
                "starting position",
            )?;
            let offset = base_address + start;
            by_offset.insert(offset, entries.len());
            entries.push(DirectoryEntry {
                tag,
                length,
                offset,
            });
        }

        Ok(Directory { entries, by_offset })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose field data starts exactly at `offset`.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<&DirectoryEntry> {
        self.by_offset.get(&offset).map(|&i| &self.entries[i])
    }

    /// Entry at `offset`, falling back to the `+1, -1, ... +4, -4` probe
    /// when the exact offset is absent.
    ///
    /// Tolerates the minor byte-count drift produced by encoding
    /// mismatches between a record's directory and its data area.
    #[must_use]
    pub fn probe(&self, offset: usize) -> Option<&DirectoryEntry> {
        if let Some(entry) = self.get(offset) {
            return Some(entry);
        }
        for delta in PROBE_OFFSETS {
            let Some(candidate) = offset.checked_add_signed(delta) else {
                continue;
            };
            if let Some(entry) = self.get(candidate) {
                return Some(entry);
            }
        }
        None
    }

    /// Iterate over the entries in directory order.
    pub fn iter(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.iter()
    }
}

/// Parse a fixed-width run of ASCII digits without allocating.
fn parse_digits(bytes: &[u8], tag: &str, what: &str) -> Result<usize> {
    let mut value = 0usize;
    for &byte in bytes {
        if byte.is_ascii_digit() {
            value = value * 10 + (byte - b'0') as usize;
        } else {
            return Err(MarcError::CorruptDirectory(format!(
                "entry for tag {tag} has non-numeric {what}: byte {:#04x}",
                byte
            )));
        }
    }
    Ok(value)
}
