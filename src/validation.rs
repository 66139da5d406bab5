//! Pluggable tag/indicator/subfield-id validation.
//!
//! Validation never raises: the validator normalizes values when a field is
//! built and answers `is_*_valid` predicates afterwards, leaving the caller
//! to decide whether to reject the record.
//!
//! Two built-in policies exist: [`StrictValidator`] applies the character
//! classes below, [`PermissiveValidator`] accepts anything unchanged.

use lazy_static::lazy_static;
use regex::Regex;

/// Legacy placeholder characters some producers emit where a blank belongs.
const PLACEHOLDER_CHARS: [char; 5] = ['-', '#', '.', '^', '_'];

/// Maximum indicator length accepted by the strict policy.
const MAX_INDICATOR_LENGTH: usize = 9;

lazy_static! {
    /// Three uppercase-alphanumeric characters.
    static ref TAG_PATTERN: Regex = Regex::new(r"^[0-9A-Z]{3}$").expect("static pattern");
    /// Blank, alphanumeric, or `@`, up to the indicator limit.
    static ref INDICATOR_PATTERN: Regex =
        Regex::new(r"^[ 0-9A-Za-z@]{0,9}$").expect("static pattern");
    /// The printable-ASCII set admitted for subfield identifiers.
    static ref SUBFIELD_ID_PATTERN: Regex =
        Regex::new(r##"^[0-9a-z!"#$%&'()*+,\-./:;<=>?@_]+$"##).expect("static pattern");
}

/// Validation and normalization policy for field components.
///
/// Consulted by the field builder at construction time (normalization) and
/// exposed for post-hoc validity checks on finished fields.
pub trait MarcValidator: std::fmt::Debug + Send + Sync {
    /// Normalize a raw tag.
    fn normalize_tag(&self, tag: &str) -> String;

    /// Whether a (normalized) tag is acceptable.
    fn is_tag_valid(&self, tag: &str) -> bool;

    /// Normalize a raw indicator string.
    fn normalize_indicator(&self, indicator: &str) -> String;

    /// Whether a (normalized) indicator is acceptable.
    fn is_indicator_valid(&self, indicator: &str) -> bool;

    /// Normalize a raw subfield identifier.
    fn normalize_subfield_id(&self, id: &str) -> String;

    /// Whether a (normalized) subfield identifier is acceptable.
    fn is_subfield_id_valid(&self, id: &str) -> bool;
}

/// The strict policy: MARC21-shaped tags, bounded indicators, a fixed
/// subfield-id character set, and placeholder-to-blank normalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictValidator;

impl StrictValidator {
    /// Replace legacy placeholder characters with blanks.
    fn scrub(value: &str) -> String {
        value
            .chars()
            .map(|c| if PLACEHOLDER_CHARS.contains(&c) { ' ' } else { c })
            .collect()
    }
}

impl MarcValidator for StrictValidator {
    fn normalize_tag(&self, tag: &str) -> String {
        Self::scrub(tag)
    }

    fn is_tag_valid(&self, tag: &str) -> bool {
        TAG_PATTERN.is_match(tag) || tag == "   "
    }

    fn normalize_indicator(&self, indicator: &str) -> String {
        Self::scrub(indicator)
    }

    fn is_indicator_valid(&self, indicator: &str) -> bool {
        indicator.len() <= MAX_INDICATOR_LENGTH && INDICATOR_PATTERN.is_match(indicator)
    }

    fn normalize_subfield_id(&self, id: &str) -> String {
        id.to_string()
    }

    fn is_subfield_id_valid(&self, id: &str) -> bool {
        SUBFIELD_ID_PATTERN.is_match(id)
    }
}

/// The permissive policy: accepts anything, normalization is identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveValidator;

impl MarcValidator for PermissiveValidator {
    fn normalize_tag(&self, tag: &str) -> String {
        tag.to_string()
    }

    fn is_tag_valid(&self, _tag: &str) -> bool {
        true
    }

    fn normalize_indicator(&self, indicator: &str) -> String {
        indicator.to_string()
    }

    fn is_indicator_valid(&self, _indicator: &str) -> bool {
        true
    }

    fn normalize_subfield_id(&self, id: &str) -> String {
        id.to_string()
    }

    fn is_subfield_id_valid(&self, _id: &str) -> bool {
        true
    }
}
