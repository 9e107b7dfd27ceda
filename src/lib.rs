//! Reader for legacy Paradox database tables.
//!
//! Paradox tables are binary, block-structured, fixed-record files (`.DB`)
//! with an optional companion blob file (`.MB`) holding the variable-length
//! contents of memo and binary fields. This crate parses the header and
//! per-field schema, walks the block linked list, resolves blob references,
//! validates passwords and deobfuscates encrypted blocks, and recodes legacy
//! codepage text to UTF-8, mapping the fourteen Paradox field types onto a
//! neutral [`Value`] model.
//!
//! # Example
//! ```no_run
//! use paradox_reader::{OpenOptions, ParadoxReader, Value};
//!
//! let doc = ParadoxReader::open("country.db", OpenOptions::default()).unwrap();
//! let meta = doc.metadata().unwrap();
//! println!("{} records, {} fields", meta.record_count, meta.field_count);
//! for result in doc.records().unwrap() {
//!     let record = result.unwrap();
//!     if let Some(Value::Text(name)) = record.value(0) {
//!         println!("{}", name);
//!     }
//! }
//! doc.close().unwrap();
//! ```
//!
//! Encrypted tables need a password; tables with a codepage the header does
//! not declare can be recoded with an explicit `encoding` override:
//! ```no_run
//! use paradox_reader::{OpenOptions, ParadoxReader};
//!
//! let doc = ParadoxReader::open(
//!     "of.db",
//!     OpenOptions {
//!         encoding: Some("cp866".to_string()),
//!         password: None,
//!     },
//! ).unwrap();
//! # drop(doc);
//! ```

mod paradox;

pub use paradox::{
    BlobRef, FieldDesc, FieldInfo, FieldType, FileKind, Header, Metadata, OpenOptions,
    ParadoxError, ParadoxReader, Record, Records, Result, Schema, Table, Value, Warning,
};

use std::path::Path;

/// One-shot convenience: open a table, materialize every record, close.
///
/// Thin over the handle API; use [`ParadoxReader`] directly to stream large
/// tables.
pub fn read_file(path: impl AsRef<Path>, options: OpenOptions) -> Result<Table> {
    let doc = ParadoxReader::open(path, options)?;
    let metadata = doc.metadata()?;
    let records = doc.records()?.collect::<Result<Vec<Record>>>()?;
    doc.close()?;
    Ok(Table { metadata, records })
}
