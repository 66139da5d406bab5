//! MARC record, field, and subfield structures.
//!
//! [`Field`] and [`Subfield`] are immutable once built and are owned by the
//! [`Record`] (or by whatever sink consumes the event stream). The
//! [`FieldBuilder`] is the only way values mutate, and it is move-only: the
//! generator consumes one builder per field and replaces it, which rules
//! out cross-record aliasing by construction.
//!
//! # Examples
//!
//! ```
//! use marcwire::{Field, Leader, Record};
//!
//! let mut record = Record::new(Leader::default());
//! record.add_field(Field::control("001", "12345"));
//!
//! let mut title = Field::new("245", "10");
//! title.add_subfield("a", "Pelle Erobreren");
//! title.add_subfield("c", "Martin Andersen Nexø");
//! record.add_field(title);
//!
//! assert_eq!(record.control_field("001"), Some("12345"));
//! let lookup = record.lookup();
//! assert_eq!(
//!     lookup.first_value("245", "a"),
//!     Some("Pelle Erobreren")
//! );
//! ```

use crate::leader::Leader;
use crate::validation::MarcValidator;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::sync::Arc;

/// Record format label carried on `begin_record` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordFormat {
    /// MARC 21 interchange records.
    #[default]
    Marc21,
    /// danMARC2 records.
    DanMarc2,
}

impl std::fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordFormat::Marc21 => f.write_str("MARC21"),
            RecordFormat::DanMarc2 => f.write_str("danMARC2"),
        }
    }
}

/// Kind of record, derived from the leader's type-of-record character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordKind {
    /// Bibliographic description.
    #[default]
    Bibliographic,
    /// Authority data (type `z`).
    Authority,
    /// Holdings data (types `u`, `v`, `x`, `y`).
    Holdings,
    /// Classification data (type `w`).
    Classification,
    /// Community information (type `q`).
    Community,
}

impl RecordKind {
    /// Map a leader's type-of-record character (position 6).
    #[must_use]
    pub fn from_leader(leader: &Leader) -> RecordKind {
        match leader.record_type() {
            'z' => RecordKind::Authority,
            'u' | 'v' | 'x' | 'y' => RecordKind::Holdings,
            'w' => RecordKind::Classification,
            'q' => RecordKind::Community,
            _ => RecordKind::Bibliographic,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordKind::Bibliographic => "Bibliographic",
            RecordKind::Authority => "Authority",
            RecordKind::Holdings => "Holdings",
            RecordKind::Classification => "Classification",
            RecordKind::Community => "Community",
        };
        f.write_str(name)
    }
}

/// A subfield: identifier plus optional value, immutable once built.
///
/// The identifier is a string rather than a single character because some
/// dialects key variable-width identifiers by tag and record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield identifier.
    pub id: String,
    /// Subfield value; `None` for an identifier with no data bytes.
    pub value: Option<String>,
}

impl Subfield {
    /// Create a subfield with a value.
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Subfield {
            id: id.into(),
            value: Some(value.into()),
        }
    }

    /// Create a subfield with no value.
    pub fn empty(id: impl Into<String>) -> Self {
        Subfield {
            id: id.into(),
            value: None,
        }
    }

    /// The value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// A variable field: tag, indicator, optional inline value, and subfields.
///
/// A field is a *control field* iff the first two characters of its tag are
/// `"00"`; control fields carry a raw value and no indicator or subfields.
///
/// Equality and ordering are defined by the canonical key
/// `tag + "$" + indicator + "$" + sorted(subfield ids)` — two fields with
/// the same shape compare equal regardless of their values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Three-character tag.
    pub tag: String,
    /// Indicator characters (0-9 of them); empty for control fields.
    pub indicator: String,
    /// Control-field value, or a data field's inline value.
    pub value: Option<String>,
    /// Subfields in wire order.
    pub subfields: SmallVec<[Subfield; 4]>,
    /// Byte offset of the field data within its record.
    #[serde(default)]
    pub position: usize,
    /// Length of the field data in bytes.
    #[serde(default)]
    pub byte_length: usize,
}

impl Field {
    /// Create a data field with the given tag and indicator.
    pub fn new(tag: impl Into<String>, indicator: impl Into<String>) -> Self {
        Field {
            tag: tag.into(),
            indicator: indicator.into(),
            value: None,
            subfields: SmallVec::new(),
            position: 0,
            byte_length: 0,
        }
    }

    /// Create a control field carrying a raw value.
    pub fn control(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            tag: tag.into(),
            indicator: String::new(),
            value: Some(value.into()),
            subfields: SmallVec::new(),
            position: 0,
            byte_length: 0,
        }
    }

    /// Append a subfield.
    pub fn add_subfield(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.subfields.push(Subfield::new(id, value));
    }

    /// Whether this is a control field (tag starts with `00`).
    #[must_use]
    pub fn is_control_field(&self) -> bool {
        self.tag.starts_with("00")
    }

    /// First subfield value for `id`.
    #[must_use]
    pub fn subfield(&self, id: &str) -> Option<&str> {
        self.subfields
            .iter()
            .find(|s| s.id == id)
            .and_then(Subfield::value)
    }

    /// All subfield values for `id`, in wire order.
    pub fn subfields_by_id<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.subfields
            .iter()
            .filter(move |s| s.id == id)
            .filter_map(Subfield::value)
    }

    /// The canonical comparison key: tag, indicator, and sorted subfield
    /// identifiers.
    #[must_use]
    pub fn sort_key(&self) -> String {
        let mut ids: Vec<&str> = self.subfields.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        format!("{}${}${}", self.tag, self.indicator, ids.concat())
    }

    /// Whether the tag passes the given validator.
    #[must_use]
    pub fn is_tag_valid(&self, validator: &dyn MarcValidator) -> bool {
        validator.is_tag_valid(&self.tag)
    }

    /// Whether the indicator passes the given validator. Control fields
    /// must have an empty indicator.
    #[must_use]
    pub fn is_indicator_valid(&self, validator: &dyn MarcValidator) -> bool {
        if self.is_control_field() {
            return self.indicator.is_empty();
        }
        validator.is_indicator_valid(&self.indicator)
    }

    /// Whether every subfield identifier passes the given validator.
    #[must_use]
    pub fn are_subfields_valid(&self, validator: &dyn MarcValidator) -> bool {
        self.subfields
            .iter()
            .all(|s| validator.is_subfield_id_valid(&s.id))
    }

    /// Whether tag, indicator, and all subfield identifiers pass.
    #[must_use]
    pub fn is_valid(&self, validator: &dyn MarcValidator) -> bool {
        self.is_tag_valid(validator)
            && self.is_indicator_valid(validator)
            && self.are_subfields_valid(validator)
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Field {}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Move-only field builder used by the generator.
///
/// The builder consults its validator as parts arrive (normalizing tags,
/// indicators, and subfield identifiers) and is consumed by
/// [`build`](FieldBuilder::build); a finished field can never be written
/// through again.
#[derive(Debug)]
pub struct FieldBuilder {
    validator: Arc<dyn MarcValidator>,
    tag: String,
    indicator: String,
    value: Option<String>,
    subfields: SmallVec<[Subfield; 4]>,
    position: usize,
    byte_length: usize,
}

impl FieldBuilder {
    /// Create a builder bound to a validation policy.
    #[must_use]
    pub fn new(validator: Arc<dyn MarcValidator>) -> Self {
        FieldBuilder {
            validator,
            tag: String::new(),
            indicator: String::new(),
            value: None,
            subfields: SmallVec::new(),
            position: 0,
            byte_length: 0,
        }
    }

    /// Set the tag, normalized by the validator.
    pub fn tag(&mut self, raw: &str) {
        self.tag = self.validator.normalize_tag(raw);
    }

    /// Set the indicator, normalized by the validator.
    pub fn indicator(&mut self, raw: &str) {
        self.indicator = self.validator.normalize_indicator(raw);
    }

    /// Set the inline value.
    pub fn value(&mut self, value: String) {
        self.value = Some(value);
    }

    /// Append a subfield, its identifier normalized by the validator.
    pub fn subfield(&mut self, id: &str, value: Option<String>) {
        self.subfields.push(Subfield {
            id: self.validator.normalize_subfield_id(id),
            value,
        });
    }

    /// Record the byte offset of the field data within its record.
    pub fn position(&mut self, position: usize) {
        self.position = position;
    }

    /// Add consumed bytes to the field's length.
    pub fn add_byte_length(&mut self, bytes: usize) {
        self.byte_length += bytes;
    }

    /// The tag set so far.
    #[must_use]
    pub fn current_tag(&self) -> &str {
        &self.tag
    }

    /// Consume the builder into an immutable [`Field`].
    #[must_use]
    pub fn build(self) -> Field {
        Field {
            tag: self.tag,
            indicator: self.indicator,
            value: self.value,
            subfields: self.subfields,
            position: self.position,
            byte_length: self.byte_length,
        }
    }
}

/// A MARC record: format, kind, leader, and fields in wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record format label.
    pub format: RecordFormat,
    /// Record kind derived from the leader.
    pub kind: RecordKind,
    /// The 24-character leader.
    pub leader: Leader,
    /// Fields in the order they appeared on the wire.
    pub fields: Vec<Field>,
}

impl Record {
    /// Create an empty MARC21 record; the kind is derived from the leader.
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            format: RecordFormat::Marc21,
            kind: RecordKind::from_leader(&leader),
            leader,
            fields: Vec::new(),
        }
    }

    /// Create an empty record with an explicit format and kind.
    #[must_use]
    pub fn with_format(format: RecordFormat, kind: RecordKind, leader: Leader) -> Self {
        Record {
            format,
            kind,
            leader,
            fields: Vec::new(),
        }
    }

    /// Append a field, preserving wire order.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Iterate over all fields in wire order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Iterate over fields with the given tag.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.tag == tag)
    }

    /// First field with the given tag.
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Value of the control field with the given tag.
    #[must_use]
    pub fn control_field(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.tag == tag && f.is_control_field())
            .and_then(|f| f.value.as_deref())
    }

    /// Materialize the nested lookup projection
    /// (tag → repetition → indicator/subfields).
    ///
    /// This is a derived view for convenient access; the field sequence
    /// remains the source of truth.
    #[must_use]
    pub fn lookup(&self) -> RecordLookup {
        let mut by_tag: IndexMap<String, Vec<FieldLookup>> = IndexMap::new();
        for field in &self.fields {
            let mut subfields: IndexMap<String, Vec<String>> = IndexMap::new();
            for subfield in &field.subfields {
                if let Some(value) = subfield.value() {
                    subfields
                        .entry(subfield.id.clone())
                        .or_default()
                        .push(value.to_string());
                }
            }
            by_tag.entry(field.tag.clone()).or_default().push(FieldLookup {
                indicator: field.indicator.clone(),
                value: field.value.clone(),
                subfields,
            });
        }
        RecordLookup { by_tag }
    }
}

/// One repetition of a field inside a [`RecordLookup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLookup {
    /// The field's indicator.
    pub indicator: String,
    /// The field's inline or control value.
    pub value: Option<String>,
    /// Subfield values grouped by identifier, insertion-ordered.
    pub subfields: IndexMap<String, Vec<String>>,
}

/// Nested lookup view over a record:
/// tag → repetitions → indicator → subfield id → values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLookup {
    by_tag: IndexMap<String, Vec<FieldLookup>>,
}

impl RecordLookup {
    /// All repetitions of a tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&[FieldLookup]> {
        self.by_tag.get(tag).map(Vec::as_slice)
    }

    /// First value of `id` in the first repetition of `tag`.
    #[must_use]
    pub fn first_value(&self, tag: &str, id: &str) -> Option<&str> {
        self.by_tag
            .get(tag)?
            .first()?
            .subfields
            .get(id)?
            .first()
            .map(String::as_str)
    }

    /// Tags present in the record, in first-appearance order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{PermissiveValidator, StrictValidator};

    #[test]
    fn test_control_field_predicate() {
        assert!(Field::control("001", "x").is_control_field());
        assert!(Field::control("009", "x").is_control_field());
        assert!(!Field::new("010", "  ").is_control_field());
        assert!(!Field::new("245", "10").is_control_field());
    }

    #[test]
    fn test_sort_key() {
        let mut field = Field::new("245", "10");
        field.add_subfield("c", "author");
        field.add_subfield("a", "title");
        assert_eq!(field.sort_key(), "245$10$ac");

        let control = Field::control("001", "id");
        assert_eq!(control.sort_key(), "001$$");
    }

    #[test]
    fn test_equality_is_shape_based() {
        let mut left = Field::new("650", " 0");
        left.add_subfield("a", "Sailing");
        let mut right = Field::new("650", " 0");
        right.add_subfield("a", "Whaling");
        // Same canonical key, different values.
        assert_eq!(left, right);

        let mut other = Field::new("650", " 1");
        other.add_subfield("a", "Sailing");
        assert_ne!(left, other);
    }

    #[test]
    fn test_ordering_by_key() {
        let a = Field::new("100", "1 ");
        let b = Field::new("245", "10");
        assert!(a < b);
    }

    #[test]
    fn test_builder_normalizes_through_validator() {
        let mut builder = FieldBuilder::new(Arc::new(StrictValidator));
        builder.tag("1-2");
        builder.indicator("#0");
        builder.subfield("a", Some("value".to_string()));
        let field = builder.build();
        assert_eq!(field.tag, "1 2");
        assert_eq!(field.indicator, " 0");
    }

    #[test]
    fn test_builder_is_consumed() {
        let mut builder = FieldBuilder::new(Arc::new(PermissiveValidator));
        builder.tag("245");
        builder.position(61);
        builder.add_byte_length(20);
        let field = builder.build();
        assert_eq!(field.position, 61);
        assert_eq!(field.byte_length, 20);
    }

    #[test]
    fn test_validity_predicates() {
        let strict = StrictValidator;
        let mut field = Field::new("245", "10");
        field.add_subfield("a", "x");
        assert!(field.is_valid(&strict));

        let mut odd = Field::new("24!", "10");
        odd.add_subfield("a", "x");
        assert!(!odd.is_tag_valid(&strict));
        assert!(!odd.is_valid(&strict));

        let mut control = Field::control("001", "x");
        assert!(control.is_indicator_valid(&strict));
        control.indicator = "1".to_string();
        assert!(!control.is_indicator_valid(&strict));
    }

    #[test]
    fn test_record_accessors() {
        let mut record = Record::new(Leader::default());
        record.add_field(Field::control("001", "12345"));
        let mut field = Field::new("650", " 0");
        field.add_subfield("a", "Seafaring life");
        record.add_field(field.clone());
        record.add_field(field);

        assert_eq!(record.control_field("001"), Some("12345"));
        assert_eq!(record.fields_by_tag("650").count(), 2);
        assert!(record.get_field("245").is_none());
    }

    #[test]
    fn test_record_kind_from_leader() {
        let bib = Leader::from_bytes_padded(b"00000nam a2200000 a 4500");
        assert_eq!(RecordKind::from_leader(&bib), RecordKind::Bibliographic);
        let auth = Leader::from_bytes_padded(b"00000nz  a2200000 a 4500");
        assert_eq!(RecordKind::from_leader(&auth), RecordKind::Authority);
        let holdings = Leader::from_bytes_padded(b"00000nx  a2200000 a 4500");
        assert_eq!(RecordKind::from_leader(&holdings), RecordKind::Holdings);
    }

    #[test]
    fn test_lookup_projection() {
        let mut record = Record::new(Leader::default());
        let mut first = Field::new("650", " 0");
        first.add_subfield("a", "Whales");
        first.add_subfield("a", "Ships");
        let mut second = Field::new("650", " 4");
        second.add_subfield("a", "Voyages");
        record.add_field(first);
        record.add_field(second);

        let lookup = record.lookup();
        let repetitions = lookup.get("650").unwrap();
        assert_eq!(repetitions.len(), 2);
        assert_eq!(repetitions[0].indicator, " 0");
        assert_eq!(
            repetitions[0].subfields.get("a").unwrap(),
            &vec!["Whales".to_string(), "Ships".to_string()]
        );
        assert_eq!(lookup.first_value("650", "a"), Some("Whales"));
        assert_eq!(lookup.tags().collect::<Vec<_>>(), vec!["650"]);
    }
}
