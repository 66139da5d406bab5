//! MARC record leader parsing and construction.
//!
//! The leader is a fixed 24-character positional record at the start of
//! every MARC record, describing the record's physical layout and
//! cataloging attributes.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Type of record
//! - Position 7: Bibliographic level
//! - Position 8: Type of control record
//! - Position 9: Character coding scheme
//! - Position 10: Indicator count (1 digit)
//! - Position 11: Subfield code count (1 digit, includes the delimiter)
//! - Positions 12-16: Base address of data (5 digits)
//! - Position 17: Encoding level
//! - Position 18: Cataloging form
//! - Position 19: Multipart resource record level
//! - Position 20: Width of the directory data-field-length entries
//! - Position 21: Width of the directory starting-character-position entries
//! - Position 22: Width of the directory segment-identifier entries
//! - Position 23: Undefined / future use
//!
//! The serialized form is always exactly 24 characters. Input that is
//! short or absent is padded with blanks ([`Leader::from_bytes_padded`]),
//! and [`Leader::default`] yields the fully blank leader.

use crate::error::{MarcError, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serialized leader size in bytes.
pub const LEADER_LENGTH: usize = 24;

/// MARC leader — the 24-character record header.
///
/// Stored raw so that blank and non-numeric positions survive a
/// parse/serialize round trip byte-for-byte.
///
/// # Examples
///
/// ```
/// use marcwire::Leader;
///
/// let leader = Leader::parse(b"01500nam a2200061 a 4500")?;
/// assert_eq!(leader.record_length(), 1500);
/// assert_eq!(leader.record_type(), 'a');
/// assert_eq!(leader.indicator_count(), 2);
/// assert_eq!(leader.data_base_address(), 61);
/// assert_eq!(leader.to_string().len(), 24);
/// # Ok::<(), marcwire::MarcError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leader {
    raw: [u8; LEADER_LENGTH],
}

impl Default for Leader {
    /// The blank-filled leader, usable when upstream data is absent or
    /// malformed.
    fn default() -> Self {
        Leader {
            raw: [b' '; LEADER_LENGTH],
        }
    }
}

impl Leader {
    /// Parse a leader from exactly 24 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] if the input is not exactly 24
    /// bytes long.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be exactly {LEADER_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let mut raw = [b' '; LEADER_LENGTH];
        raw.copy_from_slice(bytes);
        Ok(Leader { raw })
    }

    /// Build a leader from arbitrary input, padding short input with
    /// blanks and ignoring bytes past position 23.
    #[must_use]
    pub fn from_bytes_padded(bytes: &[u8]) -> Self {
        let mut raw = [b' '; LEADER_LENGTH];
        let take = bytes.len().min(LEADER_LENGTH);
        raw[..take].copy_from_slice(&bytes[..take]);
        Leader { raw }
    }

    /// Create a builder for field-by-field construction.
    #[must_use]
    pub fn builder() -> LeaderBuilder {
        LeaderBuilder {
            raw: [b' '; LEADER_LENGTH],
        }
    }

    /// The serialized 24-byte form.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; LEADER_LENGTH] {
        &self.raw
    }

    /// Record length in bytes (positions 0-4); 0 when blank or unparsable.
    #[must_use]
    pub fn record_length(&self) -> u32 {
        self.numeric(0, 5)
    }

    /// Record status (position 5).
    #[must_use]
    pub fn record_status(&self) -> char {
        self.raw[5] as char
    }

    /// Type of record (position 6).
    #[must_use]
    pub fn record_type(&self) -> char {
        self.raw[6] as char
    }

    /// Bibliographic level (position 7).
    #[must_use]
    pub fn bibliographic_level(&self) -> char {
        self.raw[7] as char
    }

    /// Type of control record (position 8).
    #[must_use]
    pub fn control_type(&self) -> char {
        self.raw[8] as char
    }

    /// Character coding scheme (position 9).
    #[must_use]
    pub fn character_coding(&self) -> char {
        self.raw[9] as char
    }

    /// Number of indicator characters per data field (position 10).
    #[must_use]
    pub fn indicator_count(&self) -> usize {
        self.digit(10)
    }

    /// Length of a subfield identifier including its delimiter
    /// (position 11).
    #[must_use]
    pub fn subfield_code_count(&self) -> usize {
        self.digit(11)
    }

    /// Base address of the variable-field data area (positions 12-16).
    #[must_use]
    pub fn data_base_address(&self) -> u32 {
        self.numeric(12, 5)
    }

    /// Encoding level (position 17).
    #[must_use]
    pub fn encoding_level(&self) -> char {
        self.raw[17] as char
    }

    /// Descriptive cataloging form (position 18).
    #[must_use]
    pub fn cataloging_form(&self) -> char {
        self.raw[18] as char
    }

    /// Multipart resource record level (position 19).
    #[must_use]
    pub fn multipart_level(&self) -> char {
        self.raw[19] as char
    }

    /// Width of the data-field-length part of a directory entry
    /// (position 20).
    #[must_use]
    pub fn data_field_length_width(&self) -> usize {
        self.digit(20)
    }

    /// Width of the starting-character-position part of a directory entry
    /// (position 21).
    #[must_use]
    pub fn starting_position_width(&self) -> usize {
        self.digit(21)
    }

    /// Width of the segment-identifier part of a directory entry
    /// (position 22).
    #[must_use]
    pub fn segment_identifier_width(&self) -> usize {
        self.digit(22)
    }

    /// Undefined position 23.
    #[must_use]
    pub fn future_use(&self) -> char {
        self.raw[23] as char
    }

    /// Parse a run of ASCII digits; blank or unparsable runs yield 0.
    fn numeric(&self, start: usize, width: usize) -> u32 {
        let slice = &self.raw[start..start + width];
        let text = std::str::from_utf8(slice).unwrap_or("").trim();
        text.parse().unwrap_or(0)
    }

    /// Parse a single digit position; blank or non-digit yields 0.
    fn digit(&self, position: usize) -> usize {
        (self.raw[position] as char)
            .to_digit(10)
            .map_or(0, |d| d as usize)
    }
}

impl std::fmt::Display for Leader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.raw))
    }
}

impl Serialize for Leader {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Leader {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if !text.is_ascii() {
            return Err(D::Error::custom("leader must be ASCII"));
        }
        Ok(Leader::from_bytes_padded(text.as_bytes()))
    }
}

/// Field-by-field leader construction with range validation.
///
/// Every setter validates its value against the positional width it
/// occupies; out-of-range values fail at construction time and are never
/// silently clamped.
///
/// # Examples
///
/// ```
/// use marcwire::Leader;
///
/// let leader = Leader::builder()
///     .record_length(1500)?
///     .record_status('n')?
///     .record_type('a')?
///     .bibliographic_level('m')?
///     .character_coding('a')?
///     .indicator_count(2)?
///     .subfield_code_count(2)?
///     .data_base_address(61)?
///     .data_field_length_width(4)?
///     .starting_position_width(5)?
///     .segment_identifier_width(0)?
///     .build();
/// assert_eq!(leader.record_length(), 1500);
/// # Ok::<(), marcwire::MarcError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LeaderBuilder {
    raw: [u8; LEADER_LENGTH],
}

impl LeaderBuilder {
    /// Set the record length (positions 0-4).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] if the value does not fit the
    /// five-digit field.
    pub fn record_length(mut self, length: u32) -> Result<Self> {
        self.write_numeric(0, 5, length, "record length")?;
        Ok(self)
    }

    /// Set the record status (position 5).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn record_status(mut self, status: char) -> Result<Self> {
        self.write_char(5, status, "record status")?;
        Ok(self)
    }

    /// Set the type of record (position 6).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn record_type(mut self, kind: char) -> Result<Self> {
        self.write_char(6, kind, "record type")?;
        Ok(self)
    }

    /// Set the bibliographic level (position 7).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn bibliographic_level(mut self, level: char) -> Result<Self> {
        self.write_char(7, level, "bibliographic level")?;
        Ok(self)
    }

    /// Set the type of control record (position 8).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn control_type(mut self, kind: char) -> Result<Self> {
        self.write_char(8, kind, "control type")?;
        Ok(self)
    }

    /// Set the character coding scheme (position 9).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn character_coding(mut self, coding: char) -> Result<Self> {
        self.write_char(9, coding, "character coding")?;
        Ok(self)
    }

    /// Set the indicator count (position 10).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] unless the count is a single
    /// digit 0-9.
    pub fn indicator_count(mut self, count: u8) -> Result<Self> {
        self.write_digit(10, count, "indicator count")?;
        Ok(self)
    }

    /// Set the subfield code count (position 11).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] unless the count is a single
    /// digit 0-9.
    pub fn subfield_code_count(mut self, count: u8) -> Result<Self> {
        self.write_digit(11, count, "subfield code count")?;
        Ok(self)
    }

    /// Set the base address of data (positions 12-16).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] if the value does not fit the
    /// five-digit field.
    pub fn data_base_address(mut self, address: u32) -> Result<Self> {
        self.write_numeric(12, 5, address, "base address of data")?;
        Ok(self)
    }

    /// Set the encoding level (position 17).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn encoding_level(mut self, level: char) -> Result<Self> {
        self.write_char(17, level, "encoding level")?;
        Ok(self)
    }

    /// Set the descriptive cataloging form (position 18).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn cataloging_form(mut self, form: char) -> Result<Self> {
        self.write_char(18, form, "cataloging form")?;
        Ok(self)
    }

    /// Set the multipart resource record level (position 19).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn multipart_level(mut self, level: char) -> Result<Self> {
        self.write_char(19, level, "multipart level")?;
        Ok(self)
    }

    /// Set the directory data-field-length width (position 20).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] unless the width is a single
    /// digit 0-9.
    pub fn data_field_length_width(mut self, width: u8) -> Result<Self> {
        self.write_digit(20, width, "data field length width")?;
        Ok(self)
    }

    /// Set the directory starting-character-position width (position 21).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] unless the width is a single
    /// digit 0-9.
    pub fn starting_position_width(mut self, width: u8) -> Result<Self> {
        self.write_digit(21, width, "starting position width")?;
        Ok(self)
    }

    /// Set the directory segment-identifier width (position 22).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] unless the width is a single
    /// digit 0-9.
    pub fn segment_identifier_width(mut self, width: u8) -> Result<Self> {
        self.write_digit(22, width, "segment identifier width")?;
        Ok(self)
    }

    /// Set the undefined position 23.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] for non-ASCII or control
    /// characters.
    pub fn future_use(mut self, value: char) -> Result<Self> {
        self.write_char(23, value, "future use")?;
        Ok(self)
    }

    /// Finish construction.
    #[must_use]
    pub fn build(self) -> Leader {
        Leader { raw: self.raw }
    }

    fn write_numeric(&mut self, start: usize, width: usize, value: u32, name: &str) -> Result<()> {
        let limit = 10u32.pow(u32::try_from(width).unwrap_or(0)) - 1;
        if value > limit {
            return Err(MarcError::InvalidLeader(format!(
                "{name} must be at most {limit}, got {value}"
            )));
        }
        let text = format!("{value:0width$}");
        self.raw[start..start + width].copy_from_slice(text.as_bytes());
        Ok(())
    }

    fn write_digit(&mut self, position: usize, value: u8, name: &str) -> Result<()> {
        if value > 9 {
            return Err(MarcError::InvalidLeader(format!(
                "{name} must be a single digit 0-9, got {value}"
            )));
        }
        self.raw[position] = b'0' + value;
        Ok(())
    }

    fn write_char(&mut self, position: usize, value: char, name: &str) -> Result<()> {
        if !value.is_ascii() || (value.is_ascii_control()) {
            return Err(MarcError::InvalidLeader(format!(
                "{name} must be a printable ASCII character, got {value:?}"
            )));
        }
        self.raw[position] = value as u8;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARC21_LEADER: &[u8] = b"01500nam a2200061 a 4500";

    #[test]
    fn test_parse_positions() {
        let leader = Leader::parse(MARC21_LEADER).unwrap();
        assert_eq!(leader.record_length(), 1500);
        assert_eq!(leader.record_status(), 'n');
        assert_eq!(leader.record_type(), 'a');
        assert_eq!(leader.bibliographic_level(), 'm');
        assert_eq!(leader.control_type(), ' ');
        assert_eq!(leader.character_coding(), 'a');
        assert_eq!(leader.indicator_count(), 2);
        assert_eq!(leader.subfield_code_count(), 2);
        assert_eq!(leader.data_base_address(), 61);
        assert_eq!(leader.encoding_level(), ' ');
        assert_eq!(leader.cataloging_form(), 'a');
        assert_eq!(leader.multipart_level(), ' ');
        assert_eq!(leader.data_field_length_width(), 4);
        assert_eq!(leader.starting_position_width(), 5);
        assert_eq!(leader.segment_identifier_width(), 0);
        assert_eq!(leader.future_use(), '0');
    }

    #[test]
    fn test_parse_requires_exact_length() {
        assert!(Leader::parse(b"too short").is_err());
        assert!(Leader::parse(&[b' '; 25]).is_err());
    }

    #[test]
    fn test_serialized_length_is_always_24() {
        for input in [
            &b""[..],
            b"0",
            b"01500nam",
            MARC21_LEADER,
            b"01500nam a2200061 a 4500 trailing garbage",
        ] {
            let leader = Leader::from_bytes_padded(input);
            assert_eq!(leader.to_string().len(), LEADER_LENGTH);
            assert_eq!(leader.as_bytes().len(), LEADER_LENGTH);
        }
    }

    #[test]
    fn test_default_is_blank() {
        let leader = Leader::default();
        assert_eq!(leader.to_string(), " ".repeat(24));
        assert_eq!(leader.record_length(), 0);
        assert_eq!(leader.data_base_address(), 0);
        assert_eq!(leader.indicator_count(), 0);
    }

    #[test]
    fn test_roundtrip() {
        let leader = Leader::parse(MARC21_LEADER).unwrap();
        let reparsed = Leader::parse(leader.as_bytes()).unwrap();
        assert_eq!(leader, reparsed);
    }

    #[test]
    fn test_builder_happy_path() {
        let leader = Leader::builder()
            .record_length(42)
            .unwrap()
            .record_status('c')
            .unwrap()
            .indicator_count(2)
            .unwrap()
            .subfield_code_count(2)
            .unwrap()
            .data_base_address(99)
            .unwrap()
            .data_field_length_width(4)
            .unwrap()
            .starting_position_width(5)
            .unwrap()
            .build();
        assert_eq!(leader.record_length(), 42);
        assert_eq!(leader.record_status(), 'c');
        assert_eq!(leader.data_base_address(), 99);
        assert_eq!(leader.to_string().len(), 24);
    }

    #[test]
    fn test_builder_rejects_out_of_range() {
        assert!(Leader::builder().record_length(100_000).is_err());
        assert!(Leader::builder().data_base_address(100_000).is_err());
        assert!(Leader::builder().indicator_count(10).is_err());
        assert!(Leader::builder().subfield_code_count(10).is_err());
        assert!(Leader::builder().data_field_length_width(10).is_err());
        assert!(Leader::builder().record_status('\u{1e}').is_err());
    }

    #[test]
    fn test_builder_never_clamps() {
        // An out-of-range value must not leave a partially written leader.
        let result = Leader::builder().record_length(1234).and_then(|b| b.indicator_count(12));
        assert!(result.is_err());
    }

    #[test]
    fn test_padded_short_input() {
        let leader = Leader::from_bytes_padded(b"01500");
        assert_eq!(leader.record_length(), 1500);
        assert_eq!(leader.record_status(), ' ');
        assert_eq!(leader.data_base_address(), 0);
    }

    #[test]
    fn test_non_numeric_length_reads_as_zero() {
        let leader = Leader::from_bytes_padded(b"xxxxxnam a2200061 a 4500");
        assert_eq!(leader.record_length(), 0);
        assert_eq!(leader.data_base_address(), 61);
    }
}
