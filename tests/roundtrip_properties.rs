//! Property tests: chunking, leader, and encode/decode round trips.

use marcwire::{
    ChunkRead, Field, Leader, MarcReader, Record, SeparatorChunkReader, SeparatorKind,
    Subfield,
};
use proptest::prelude::*;
use std::io::Cursor;

/// Reference chunking model: split on the four separator bytes, tagging
/// each span with the separator that preceded it.
fn reference_chunks(input: &[u8]) -> Vec<(SeparatorKind, Vec<u8>)> {
    let mut chunks = Vec::new();
    let mut last_kind = SeparatorKind::File;
    let mut pending = Vec::new();
    for &byte in input {
        if let Some(kind) = SeparatorKind::from_byte(byte) {
            chunks.push((last_kind, std::mem::take(&mut pending)));
            last_kind = kind;
        } else {
            pending.push(byte);
        }
    }
    if !pending.is_empty() {
        chunks.push((last_kind, pending));
    }
    chunks
}

proptest! {
    /// Concatenated chunk data equals the input minus separators, and the
    /// chunk tags match the separators actually present, for fill sizes
    /// including single-byte and exact-length buffers.
    #[test]
    fn chunking_matches_reference_model(input in proptest::collection::vec(any::<u8>(), 0..200)) {
        let expected = reference_chunks(&input);
        for capacity in [1usize, 2, 7, input.len().max(1)] {
            let reader = SeparatorChunkReader::with_fill_capacity(
                Cursor::new(input.clone()),
                capacity,
            );
            let got: Vec<(SeparatorKind, Vec<u8>)> = reader
                .chunks()
                .map(|chunk| {
                    let chunk = chunk.unwrap();
                    (chunk.kind, chunk.data.to_vec())
                })
                .collect();
            prop_assert_eq!(&got, &expected, "fill capacity {}", capacity);

            let joined: Vec<u8> = got.iter().flat_map(|(_, data)| data.iter().copied()).collect();
            let stripped: Vec<u8> = input
                .iter()
                .copied()
                .filter(|b| SeparatorKind::from_byte(*b).is_none())
                .collect();
            prop_assert_eq!(joined, stripped);
        }
    }

    /// Parsing any input into a leader and serializing it always yields
    /// exactly 24 characters.
    #[test]
    fn leader_serialization_is_always_24_chars(input in proptest::collection::vec(any::<u8>(), 0..64)) {
        let leader = Leader::from_bytes_padded(&input);
        prop_assert_eq!(leader.to_string().chars().count(), 24);
        prop_assert_eq!(leader.as_bytes().len(), 24);
    }
}

/// A printable value with no separator bytes.
fn value_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ -~]{1,24}").expect("valid regex")
}

fn control_field_strategy() -> impl Strategy<Value = Field> {
    ("00[1-9]", value_strategy()).prop_map(|(tag, value)| Field::control(tag, value))
}

fn data_field_strategy() -> impl Strategy<Value = Field> {
    (
        "(0[1-9][0-9])|([1-9][0-9][0-9])",
        "[0-9a-z ]{2}",
        proptest::collection::vec(("[a-z0-9]", value_strategy()), 1..5),
    )
        .prop_map(|(tag, indicator, subfields)| {
            let mut field = Field::new(tag, indicator);
            for (id, value) in subfields {
                field.subfields.push(Subfield::new(id, value));
            }
            field
        })
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        proptest::collection::vec(control_field_strategy(), 0..3),
        proptest::collection::vec(data_field_strategy(), 0..6),
    )
        .prop_map(|(control_fields, data_fields)| {
            let mut record = Record::new(Leader::default());
            for field in control_fields {
                record.add_field(field);
            }
            for field in data_fields {
                record.add_field(field);
            }
            record
        })
}

proptest! {
    /// decode(encode(record)) == record, with field order, tags,
    /// indicators, subfield order and values all preserved.
    #[test]
    fn encode_decode_roundtrip(records in proptest::collection::vec(record_strategy(), 1..4)) {
        let mut wire = Vec::new();
        for record in &records {
            marcwire::encode_record(record, &mut wire);
        }
        wire.push(0x1C);

        let mut reader = MarcReader::new(Cursor::new(wire));
        let decoded = reader.read_all().unwrap();
        prop_assert_eq!(decoded.len(), records.len());

        for (got, want) in decoded.iter().zip(records.iter()) {
            prop_assert_eq!(got, want);
            prop_assert_eq!(&got.leader, &want.leader);
            prop_assert_eq!(got.fields.len(), want.fields.len());
            for (gf, wf) in got.fields.iter().zip(want.fields.iter()) {
                prop_assert_eq!(&gf.tag, &wf.tag);
                prop_assert_eq!(&gf.indicator, &wf.indicator);
                prop_assert_eq!(&gf.value, &wf.value);
                prop_assert_eq!(gf.subfields.len(), wf.subfields.len());
                for (gs, ws) in gf.subfields.iter().zip(wf.subfields.iter()) {
                    prop_assert_eq!(&gs.id, &ws.id);
                    prop_assert_eq!(&gs.value, &ws.value);
                }
            }
        }
    }
}
