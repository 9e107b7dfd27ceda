//! Lazy record iteration over the block linked list.
//!
//! The iterator walks next-block pointers starting at `header.first_block`,
//! holding one block buffer at a time. Freshly read blocks of an encrypted
//! table are deobfuscated before slicing. Records are decoded eagerly into
//! owned [`Record`]s so items outlive the reused buffer.

use std::collections::HashSet;

use log::{trace, warn};

use super::blob::BlobOutcome;
use super::blocks::{self, BLOCK_HEAD_LEN};
use super::error::{ParadoxError, Result, Warning};
use super::fields::{self, Decoded};
use super::models::{BlobRef, FieldDesc, Record, Value};
use super::reader::ParadoxReader;

/// Iterator over the records of an open document, in primary (block-chain)
/// order. Created by [`ParadoxReader::records`].
///
/// Finite and non-restartable; obtain a fresh iterator for a second pass.
/// On exhaustion, a [`Warning::RecordCountMismatch`] is recorded if the
/// yielded count disagrees with the header.
pub struct Records<'a> {
    doc: &'a ParadoxReader,
    next_block: u16,
    visited: HashSet<u16>,
    block_buf: Vec<u8>,
    records_in_block: u16,
    cursor: u16,
    emitted: u32,
    finished: bool,
}

impl<'a> Records<'a> {
    pub(crate) fn new(doc: &'a ParadoxReader) -> Self {
        Records {
            doc,
            next_block: doc.header().first_block,
            visited: HashSet::new(),
            block_buf: Vec::new(),
            records_in_block: 0,
            cursor: 0,
            emitted: 0,
            finished: false,
        }
    }

    /// Loads the next non-empty block into the buffer. `Ok(false)` means the
    /// chain is exhausted.
    fn advance_block(&mut self) -> Result<bool> {
        loop {
            if self.next_block == 0 {
                return Ok(false);
            }
            let block_no = self.next_block;
            let header = self.doc.header();
            let offset = blocks::block_offset(header, block_no);

            if !self.visited.insert(block_no) {
                return Err(ParadoxError::bad_format(
                    format!("cycle in block list: block {} visited twice", block_no),
                    offset,
                ));
            }

            {
                let mut guard = self.doc.lock_inner();
                let inner = guard.as_mut().ok_or(ParadoxError::InvalidHandle)?;
                if offset + u64::from(header.block_len) > inner.db.len() {
                    return Err(ParadoxError::bad_format(
                        format!("block {} lies past the end of the file", block_no),
                        offset,
                    ));
                }
                self.block_buf.resize(header.block_len as usize, 0);
                inner.db.read_at(offset, &mut self.block_buf)?;
                if let Some(key) = inner.key {
                    key.decode_block(&mut self.block_buf, block_no);
                }
            }

            let head = blocks::parse_block_head(&self.block_buf, header, offset)?;
            trace!(
                "Block {}: next {}, prev {}, {} records",
                block_no,
                head.next,
                head.prev,
                head.records_used
            );
            self.next_block = head.next;
            if head.records_used == 0 {
                continue;
            }
            self.records_in_block = head.records_used;
            self.cursor = 0;
            return Ok(true);
        }
    }

    /// Slices and decodes the record under the cursor.
    fn decode_current(&mut self) -> Result<Record> {
        let doc = self.doc;
        let header = doc.header();
        let schema = doc.schema();
        let record_len = usize::from(header.record_len);
        let base = BLOCK_HEAD_LEN + usize::from(self.cursor) * record_len;
        let raw = &self.block_buf[base..base + record_len];

        let mut values = Vec::with_capacity(schema.field_count());
        for (i, desc) in schema.fields().iter().enumerate() {
            let at = usize::from(schema.offset(i));
            let cell = &raw[at..at + usize::from(desc.len)];
            let value = match fields::decode(cell, desc, doc.codepage_label()) {
                Decoded::Value(v) => v,
                Decoded::Blob(blob_ref) => resolve_blob(doc, desc, &blob_ref, self.emitted)?,
            };
            values.push(value);
        }

        let record = Record::new(self.emitted, values);
        self.cursor += 1;
        self.emitted += 1;
        Ok(record)
    }

    fn finish(&mut self) {
        self.finished = true;
        let declared = self.doc.header().num_records;
        if self.emitted != declared {
            warn!(
                "Header declares {} records but iteration produced {}",
                declared, self.emitted
            );
            self.doc.push_warning(Warning::RecordCountMismatch {
                declared,
                found: self.emitted,
            });
        }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.cursor >= self.records_in_block {
            match self.advance_block() {
                Ok(true) => {}
                Ok(false) => {
                    self.finish();
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        match self.decode_current() {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Chases an external blob reference into the `.MB` file.
///
/// A missing blob file yields Null (the warning was recorded at open time);
/// a modifier mismatch yields Null plus a per-cell warning; structural
/// errors propagate and abort iteration.
fn resolve_blob(
    doc: &ParadoxReader,
    desc: &FieldDesc,
    blob: &BlobRef,
    record: u32,
) -> Result<Value> {
    let mut guard = doc.lock_inner();
    let inner = guard.as_mut().ok_or(ParadoxError::InvalidHandle)?;
    let resolver = match inner.mb.as_mut() {
        Some(resolver) => resolver,
        None => return Ok(Value::Null),
    };
    match resolver.read(blob)? {
        BlobOutcome::Payload(payload) => {
            Ok(fields::blob_value(desc.kind, payload, doc.codepage_label()))
        }
        BlobOutcome::ModifierMismatch { expected, found } => {
            warn!(
                "Blob modifier mismatch in field '{}' at record {}: cell has {}, blob file has {}",
                desc.name, record, expected, found
            );
            doc.push_warning(Warning::BlobModifierMismatch {
                field: desc.name.clone(),
                record,
                expected,
                found,
            });
            Ok(Value::Null)
        }
    }
}
