//! Integration tests for the marcwire library.

use marcwire::{
    encode_record, ChunkRead, ErrorMode, EventCollector, Field, Leader, MarcError, MarcEvent,
    MarcReader, MarcWriter, PatternChunkReader, Record, RecordCollector, RecordGenerator,
    SegmentCompression, SeparatorChunkReader, SeparatorKind, SplitWriter, StrictValidator,
};
use std::io::{Cursor, Read, Write};

const US: u8 = 0x1F;
const RS: u8 = 0x1E;
const GS: u8 = 0x1D;
const FS: u8 = 0x1C;

/// Assemble one directory-addressed ISO 2709 record.
fn wire_record(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut directory = String::new();
    let mut data = Vec::new();
    let mut start = 0usize;
    for (tag, body) in fields {
        let length = body.len() + 1;
        directory.push_str(&format!("{tag}{length:04}{start:05}"));
        data.extend_from_slice(body);
        data.push(RS);
        start += length;
    }
    let base = 24 + directory.len() + 1;
    let total = base + data.len() + 1;

    let mut wire = Vec::new();
    wire.extend_from_slice(format!("{total:05}nam a22{base:05} a 4500").as_bytes());
    wire.extend_from_slice(directory.as_bytes());
    wire.push(RS);
    wire.extend_from_slice(&data);
    wire.push(GS);
    wire
}

fn data_field_body(indicator: &str, subfields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(indicator.as_bytes());
    for (id, value) in subfields {
        body.push(US);
        body.extend_from_slice(id.as_bytes());
        body.extend_from_slice(value.as_bytes());
    }
    body
}

#[test]
fn test_minimal_control_field_scenario() {
    // One minimal control-field-only record terminated by GS then FS.
    let mut wire = wire_record(&[("001", b"marker".to_vec())]);
    wire.push(FS);

    let mut generator = RecordGenerator::new();
    let mut events = EventCollector::new();
    generator
        .parse(
            SeparatorChunkReader::new(Cursor::new(wire)),
            &mut events,
        )
        .unwrap();

    let record_events: Vec<&MarcEvent> = events
        .events()
        .iter()
        .filter(|e| !matches!(e, MarcEvent::BeginCollection | MarcEvent::EndCollection))
        .collect();
    assert_eq!(record_events.len(), 4, "beginRecord, leader, field, endRecord");
    assert!(matches!(record_events[0], MarcEvent::BeginRecord(_, _)));
    assert!(matches!(record_events[1], MarcEvent::Leader(_)));
    let MarcEvent::Field(field) = record_events[2] else {
        panic!("expected a field event");
    };
    assert_eq!(field.tag, "001");
    assert_eq!(field.value.as_deref(), Some("marker"));
    assert!(matches!(record_events[3], MarcEvent::EndRecord));

    // Re-encoding the same event sequence reproduces byte-identical output
    // (modulo the directory, which the encoder does not reconstruct).
    let mut first = Vec::new();
    {
        let mut record = Record::new(Leader::default());
        record.add_field(Field::control("001", "marker"));
        let writer = MarcWriter::new(&mut first);
        writer.write_record(&record).unwrap();
        writer.finish().unwrap();
    }
    let mut second = Vec::new();
    {
        let writer = MarcWriter::new(&mut second);
        let mut generator = RecordGenerator::new();
        let mut listener = writer.listener();
        generator
            .parse(
                SeparatorChunkReader::new(Cursor::new(first.clone())),
                &mut listener,
            )
            .unwrap();
    }
    assert_eq!(first, second);
}

#[test]
fn test_full_record_through_reader() {
    let wire = wire_record(&[
        ("001", b"ocm12345678".to_vec()),
        ("008", b"201201s2020    dk            000 0 dan d".to_vec()),
        (
            "100",
            data_field_body("1 ", &[("a", "Andersen, H. C."), ("4", "aut")]),
        ),
        (
            "245",
            data_field_body("10", &[("a", "Eventyr"), ("c", "H. C. Andersen")]),
        ),
        (
            "650",
            data_field_body(" 0", &[("a", "Fairy tales"), ("z", "Denmark")]),
        ),
    ]);

    let mut reader = MarcReader::new(Cursor::new(wire));
    let record = reader.read_record().unwrap().unwrap();

    assert_eq!(record.leader.record_type(), 'a');
    assert_eq!(record.control_field("001"), Some("ocm12345678"));
    assert!(record.control_field("008").is_some());
    assert_eq!(
        record.get_field("100").unwrap().subfield("a"),
        Some("Andersen, H. C.")
    );
    let title = record.get_field("245").unwrap();
    assert_eq!(title.indicator, "10");
    assert_eq!(title.subfield("c"), Some("H. C. Andersen"));

    let lookup = record.lookup();
    assert_eq!(lookup.first_value("650", "z"), Some("Denmark"));
    assert!(reader.read_record().unwrap().is_none());
}

#[test]
fn test_field_positions_follow_directory() {
    let wire = wire_record(&[
        ("001", b"id".to_vec()),
        ("245", data_field_body("10", &[("a", "T")])),
    ]);
    let mut reader = MarcReader::new(Cursor::new(wire));
    let record = reader.read_record().unwrap().unwrap();

    let base = record.leader.data_base_address() as usize;
    let first = record.get_field("001").unwrap();
    assert_eq!(first.position, base);
    assert_eq!(first.byte_length, 3); // "id" + terminator
    let second = record.get_field("245").unwrap();
    assert_eq!(second.position, base + 3);
}

#[test]
fn test_multi_record_stream_with_varied_buffer_sizes() {
    let mut wire = Vec::new();
    for i in 0..3 {
        wire.extend_from_slice(&wire_record(&[
            ("001", format!("rec-{i}").into_bytes()),
            ("245", data_field_body("00", &[("a", "Title")])),
        ]));
    }
    wire.push(FS);

    for capacity in [1, 2, 7, wire.len()] {
        let chunks =
            SeparatorChunkReader::with_fill_capacity(Cursor::new(wire.clone()), capacity);
        let mut generator = RecordGenerator::new();
        let mut collector = RecordCollector::new();
        generator.parse(chunks, &mut collector).unwrap();

        let records = collector.into_records();
        assert_eq!(records.len(), 3, "fill capacity {capacity}");
        for (i, record) in records.iter().enumerate() {
            assert_eq!(
                record.control_field("001").unwrap(),
                format!("rec-{i}"),
                "fill capacity {capacity}"
            );
        }
    }
}

#[test]
fn test_chunk_tags_are_temporally_consistent() {
    let input = b"head\x1fsub\x1efield\x1drecord\x1cfile-tail";
    let reader = SeparatorChunkReader::with_fill_capacity(Cursor::new(input.to_vec()), 2);
    let chunks: Vec<_> = reader.chunks().map(Result::unwrap).collect();

    let kinds: Vec<SeparatorKind> = chunks.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SeparatorKind::File,
            SeparatorKind::Subfield,
            SeparatorKind::Field,
            SeparatorKind::Record,
            SeparatorKind::File,
        ]
    );
}

#[test]
fn test_offset_recovery_plus_two() {
    // The directory claims position 2 for a field that actually starts at
    // position 0; the probe must recover it.
    let mut wire = wire_record(&[("001", b"shifted".to_vec())]);
    let entry_position = 24 + 3 + 4;
    wire[entry_position..entry_position + 5].copy_from_slice(b"00002");

    let mut reader = MarcReader::new(Cursor::new(wire));
    let record = reader.read_record().unwrap().unwrap();
    assert_eq!(record.control_field("001"), Some("shifted"));
}

#[test]
fn test_offset_beyond_probe_bound() {
    let mut wire = wire_record(&[("001", b"lost".to_vec())]);
    let entry_position = 24 + 3 + 4;
    wire[entry_position..entry_position + 5].copy_from_slice(b"00008");

    // Fatal mode raises.
    let mut fatal = MarcReader::new(Cursor::new(wire.clone()));
    assert!(matches!(
        fatal.read_record(),
        Err(MarcError::OffsetNotFound { .. })
    ));

    // Lenient mode yields the record with the field dropped.
    let mut lenient =
        MarcReader::new(Cursor::new(wire)).with_error_mode(ErrorMode::Lenient);
    let record = lenient.read_record().unwrap().unwrap();
    assert!(record.fields.is_empty());
}

#[test]
fn test_corrupt_directory_aborts_record() {
    let mut wire = wire_record(&[("001", b"x".to_vec())]);
    // Base address off by two: directory length 14 is not a multiple of 12.
    wire[12..17].copy_from_slice(b"00039");

    let mut reader = MarcReader::new(Cursor::new(wire.clone()));
    assert!(matches!(
        reader.read_record(),
        Err(MarcError::CorruptDirectory(_))
    ));

    // Lenient mode does not soften directory corruption.
    let mut lenient =
        MarcReader::new(Cursor::new(wire)).with_error_mode(ErrorMode::Lenient);
    assert!(matches!(
        lenient.read_record(),
        Err(MarcError::CorruptDirectory(_))
    ));
}

#[test]
fn test_leader_serialization_length_invariant() {
    for input in [
        &b""[..],
        b"01",
        b"01500nam",
        b"01500nam a2200061 a 4500",
        b"01500nam a2200061 a 4500 with trailing bytes",
    ] {
        let leader = Leader::from_bytes_padded(input);
        assert_eq!(leader.to_string().len(), 24);
    }
}

#[test]
fn test_validator_scenario() {
    let validator = StrictValidator;
    use marcwire::MarcValidator as _;
    assert_eq!(validator.normalize_tag("1-2"), "1 2");
    assert!(!validator.is_indicator_valid(&"0".repeat(10)));
}

#[test]
fn test_pattern_reader_feeds_generator() {
    // A line-oriented rendition: leader line, then tag/indicator/value
    // lines, fed through the CRLF pattern reader into the same generator.
    let mut wire = Vec::new();
    wire.extend_from_slice(&[b' '; 24]);
    wire.extend_from_slice(b"\r\n");
    wire.extend_from_slice(b"00187654");
    wire.extend_from_slice(b"\r\n");
    wire.extend_from_slice(b"24510aLine format title");
    wire.extend_from_slice(b"\r\n");

    let chunks = PatternChunkReader::new(
        Cursor::new(wire),
        b"\r\n".to_vec(),
        SeparatorKind::Field,
    )
    .unwrap();
    let mut generator = RecordGenerator::new();
    let mut collector = RecordCollector::new();
    generator.parse(chunks, &mut collector).unwrap();

    let records = collector.into_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].control_field("001"), Some("87654"));
    let field = records[0].get_field("245").unwrap();
    assert_eq!(field.indicator, "10");
    assert_eq!(field.value.as_deref(), Some("aLine format title"));
}

#[test]
fn test_encode_decode_roundtrip_preserves_order_and_values() {
    let mut record = Record::new(Leader::default());
    record.add_field(Field::control("001", "9912345"));
    record.add_field(Field::control("003", "DLC"));
    let mut author = Field::new("100", "1 ");
    author.add_subfield("a", "Blixen, Karen");
    record.add_field(author);
    let mut title = Field::new("245", "10");
    title.add_subfield("a", "Den afrikanske farm");
    title.add_subfield("c", "Karen Blixen");
    record.add_field(title);
    let mut subject_one = Field::new("650", " 0");
    subject_one.add_subfield("a", "Farm life");
    record.add_field(subject_one);
    let mut subject_two = Field::new("650", " 0");
    subject_two.add_subfield("a", "Kenya");
    record.add_field(subject_two);

    let mut buffer = Vec::new();
    encode_record(&record, &mut buffer);
    buffer.push(FS);

    let mut reader = MarcReader::new(Cursor::new(buffer));
    let decoded = reader.read_record().unwrap().unwrap();

    assert_eq!(decoded, record, "canonical-key equality");
    assert_eq!(decoded.fields.len(), record.fields.len());
    for (got, want) in decoded.fields.iter().zip(record.fields.iter()) {
        assert_eq!(got.tag, want.tag);
        assert_eq!(got.indicator, want.indicator);
        assert_eq!(got.value, want.value);
        assert_eq!(got.subfields.len(), want.subfields.len());
        for (gs, ws) in got.subfields.iter().zip(want.subfields.iter()) {
            assert_eq!(gs.id, ws.id);
            assert_eq!(gs.value, ws.value);
        }
    }
    assert_eq!(decoded.leader, record.leader);
}

#[test]
fn test_split_writer_numbered_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();

    let writer = SplitWriter::new(
        Box::new(move |index| {
            let file = std::fs::File::create(root.join(format!("segment-{index:04}.mrc")))?;
            Ok(Box::new(file) as Box<dyn Write + Send>)
        }),
        2,
    );

    for i in 0..5 {
        let mut record = Record::new(Leader::default());
        record.add_field(Field::control("001", i.to_string()));
        writer.write_record(&record).unwrap();
    }
    writer.finish().unwrap();
    assert_eq!(writer.records_written(), 5);

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["segment-0000.mrc", "segment-0001.mrc", "segment-0002.mrc"]
    );

    // Each segment is a complete, decodable, file-terminated stream.
    let mut total = 0;
    for name in names {
        let bytes = std::fs::read(dir.path().join(name)).unwrap();
        assert_eq!(*bytes.last().unwrap(), FS);
        let mut reader = MarcReader::new(Cursor::new(bytes));
        total += reader.read_all().unwrap().len();
    }
    assert_eq!(total, 5);
}

#[test]
fn test_split_writer_gzip_segments() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();

    let writer = SplitWriter::new(
        Box::new(move |index| {
            let file = std::fs::File::create(root.join(format!("segment-{index:04}.mrc.gz")))?;
            Ok(Box::new(file) as Box<dyn Write + Send>)
        }),
        10,
    )
    .with_compression(SegmentCompression::Gzip);

    let mut record = Record::new(Leader::default());
    record.add_field(Field::control("001", "compressed"));
    writer.write_record(&record).unwrap();
    writer.finish().unwrap();

    let compressed = std::fs::read(dir.path().join("segment-0000.mrc.gz")).unwrap();
    let mut decompressed = Vec::new();
    flate2::read::GzDecoder::new(Cursor::new(compressed))
        .read_to_end(&mut decompressed)
        .unwrap();

    let mut reader = MarcReader::new(Cursor::new(decompressed));
    let decoded = reader.read_record().unwrap().unwrap();
    assert_eq!(decoded.control_field("001"), Some("compressed"));
}

#[test]
fn test_latin1_stream_decoding() {
    let body = data_field_body("1 ", &[("a", "")]);
    let mut body = body;
    body.extend_from_slice(&[0x41, 0xE5, 0x72, 0x68, 0x75, 0x73]); // "Aårhus" in latin-1
    let wire = wire_record(&[("100", body)]);

    let mut reader = MarcReader::new(Cursor::new(wire))
        .with_encoding(encoding_rs::WINDOWS_1252);
    let record = reader.read_record().unwrap().unwrap();
    assert_eq!(
        record.get_field("100").unwrap().subfield("a"),
        Some("Aårhus")
    );
}
