//! Lifecycle, error-message contracts, and idempotence laws of the handle.

mod common;

use common::*;
use paradox_reader::{read_file, OpenOptions, ParadoxError, ParadoxReader, Record, Value};
use tempfile::tempdir;

fn sample_builder() -> TableBuilder {
    TableBuilder::new(
        "sample",
        vec![
            FieldSpec::new("Id", SHORT, 2),
            FieldSpec::new("Name", ALPHA, 12),
            FieldSpec::new("Score", NUMBER, 8),
        ],
    )
    .record(vec![short(1), alpha("first", 12), number(1.5)])
    .record(vec![short(2), alpha("second", 12), number(-2.5)])
    .record(vec![short(3), null_cell(12), null_cell(8)])
}

fn collect(doc: &ParadoxReader) -> Vec<Record> {
    doc.records()
        .expect("start iteration")
        .collect::<Result<Vec<_>, _>>()
        .expect("iterate")
}

#[test]
fn missing_file_reports_file_not_found() {
    let dir = tempdir().unwrap();
    let err =
        ParadoxReader::open(dir.path().join("nope.db"), OpenOptions::default()).unwrap_err();
    assert!(matches!(err, ParadoxError::Io { .. }), "kind: {:?}", err);
    assert!(
        err.to_string().contains("File not found"),
        "unexpected message: {}",
        err
    );
}

#[test]
fn empty_path_is_rejected_before_io() {
    let err = ParadoxReader::open("", OpenOptions::default()).unwrap_err();
    assert!(
        matches!(err, ParadoxError::InvalidArgument(_)),
        "kind: {:?}",
        err
    );
}

#[test]
fn blank_encoding_label_is_rejected_before_io() {
    let err = ParadoxReader::open(
        "whatever.db",
        OpenOptions {
            encoding: Some("   ".to_string()),
            password: None,
        },
    )
    .unwrap_err();
    assert!(
        matches!(err, ParadoxError::InvalidArgument(_)),
        "kind: {:?}",
        err
    );
}

#[test]
fn index_file_kind_is_rejected() {
    let dir = tempdir().unwrap();
    let mut builder = sample_builder();
    builder.file_kind = 0x01; // primary index
    let path = builder.write(dir.path(), "sample.px");
    let err = ParadoxReader::open(&path, OpenOptions::default()).unwrap_err();
    assert!(matches!(err, ParadoxError::BadFormat { .. }), "kind: {:?}", err);
}

#[test]
fn operations_on_a_closed_handle_fail() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");
    let doc = ParadoxReader::open(&path, OpenOptions::default()).unwrap();
    doc.close().expect("first close succeeds");

    for err in [
        doc.metadata().unwrap_err(),
        doc.records().map(|_| ()).unwrap_err(),
        doc.codepage().unwrap_err(),
        doc.warnings().unwrap_err(),
        doc.close().unwrap_err(),
    ] {
        assert!(
            matches!(err, ParadoxError::InvalidHandle),
            "kind: {:?}",
            err
        );
        assert!(
            err.to_string().contains("closed document handle"),
            "unexpected message: {}",
            err
        );
    }
}

#[test]
fn reopening_yields_equal_metadata() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");

    let doc = ParadoxReader::open(&path, OpenOptions::default()).unwrap();
    let first = doc.metadata().unwrap();
    doc.close().unwrap();

    let doc = ParadoxReader::open(&path, OpenOptions::default()).unwrap();
    assert_eq!(first, doc.metadata().unwrap());
}

#[test]
fn metadata_is_stable_across_iteration() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");
    let doc = ParadoxReader::open(&path, OpenOptions::default()).unwrap();

    let before = doc.metadata().unwrap();
    let _ = collect(&doc);
    assert_eq!(before, doc.metadata().unwrap());
}

#[test]
fn two_iterations_yield_identical_records() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");
    let doc = ParadoxReader::open(&path, OpenOptions::default()).unwrap();

    assert_eq!(collect(&doc), collect(&doc));
}

#[test]
fn two_opens_yield_identical_sequences() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");
    let a = ParadoxReader::open(&path, OpenOptions::default()).unwrap();
    let b = ParadoxReader::open(&path, OpenOptions::default()).unwrap();
    assert_eq!(collect(&a), collect(&b));
}

#[test]
fn one_shot_read_matches_the_handle_api() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");

    let table = read_file(&path, OpenOptions::default()).expect("one-shot read");

    let doc = ParadoxReader::open(&path, OpenOptions::default()).unwrap();
    assert_eq!(table.metadata, doc.metadata().unwrap());
    assert_eq!(table.records, collect(&doc));
    assert_eq!(table.records.len(), 3);
    assert_eq!(table.records[2].value(1), Some(&Value::Null));
}

#[test]
fn record_width_mismatch_is_fatal() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");

    // Corrupt the declared record width at offset 0.
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = bytes[0].wrapping_add(1);
    std::fs::write(&path, &bytes).unwrap();

    let err = ParadoxReader::open(&path, OpenOptions::default()).unwrap_err();
    assert!(matches!(err, ParadoxError::BadFormat { .. }), "kind: {:?}", err);
}

#[test]
fn dropping_the_iterator_midway_leaves_the_handle_usable() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");
    let doc = ParadoxReader::open(&path, OpenOptions::default()).unwrap();

    {
        let mut records = doc.records().unwrap();
        let first = records.next().unwrap().unwrap();
        assert_eq!(first.value(0), Some(&Value::Int(1)));
    }

    assert_eq!(collect(&doc).len(), 3);
    doc.close().unwrap();
}

#[test]
fn field_count_mismatch_per_record_never_happens() {
    let dir = tempdir().unwrap();
    let path = sample_builder().write(dir.path(), "sample.db");
    let doc = ParadoxReader::open(&path, OpenOptions::default()).unwrap();
    let field_count = doc.metadata().unwrap().field_count as usize;
    for record in collect(&doc) {
        assert_eq!(record.values().len(), field_count);
    }
}
