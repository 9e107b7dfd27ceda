//! Blob resolution against the companion `.MB` file.
//!
//! The `.MB` file is a sequence of 4 KiB blocks. A cell's 4-byte offset
//! descriptor addresses the containing block (upper bytes) and, for shared
//! blocks, the entry index (low byte). Three block layouts exist:
//!
//! - type 2: the block (possibly spanning several 4 KiB units) holds one
//!   payload, header `[type u8][span u16][length u32][modifier u16]`,
//!   payload at byte 9;
//! - type 3: a shared block with a 5-byte entry table starting at byte 12,
//!   entry `[offset/16 u8][ceil(len/16) u8][modifier u16][len%16 u8]`;
//! - type 4: a free block; a reference into one is a format error.

use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use std::path::Path;

use super::error::{ParadoxError, Result};
use super::models::BlobRef;
use super::source::ByteSource;

/// Size of one `.MB` block unit.
pub const MB_BLOCK_LEN: u64 = 4096;

const SINGLE_BLOB: u8 = 2;
const SHARED_BLOB: u8 = 3;
const FREE_BLOCK: u8 = 4;

/// Byte offset of the payload in a single-blob block.
const SINGLE_HEADER_LEN: u64 = 9;
/// Byte offset of the entry table in a shared block.
const SHARED_TABLE_AT: u64 = 12;
const SHARED_ENTRY_LEN: u64 = 5;

/// Outcome of resolving one external blob reference.
#[derive(Debug)]
pub enum BlobOutcome {
    Payload(Vec<u8>),
    /// The `.MB` entry exists but carries a different modifier than the
    /// cell; the caller surfaces a warning and yields Null.
    ModifierMismatch { expected: u16, found: u16 },
}

/// Resolver over an open `.MB` byte source. Owns its own file handle, so
/// blob seeks never disturb the main `.DB` read cursor.
#[derive(Debug)]
pub struct BlobResolver {
    source: ByteSource,
}

impl BlobResolver {
    pub fn open(path: &Path) -> Result<Self> {
        let source = ByteSource::open(path)?;
        Ok(BlobResolver { source })
    }

    /// Fetches the payload an external [`BlobRef`] points at.
    ///
    /// # Errors
    /// [`ParadoxError::BadFormat`] when the reference leaves the file, lands
    /// in a free or unrecognized block, or disagrees with the stored length;
    /// [`ParadoxError::Io`] on read failures.
    pub fn read(&mut self, blob: &BlobRef) -> Result<BlobOutcome> {
        let block_at = blob.block_offset();
        if block_at + MB_BLOCK_LEN > self.source.len() {
            return Err(ParadoxError::bad_format(
                "blob reference points past the end of the blob file",
                block_at,
            ));
        }

        let mut head = [0u8; 3];
        self.source.read_at(block_at, &mut head)?;
        let block_type = head[0];
        let span = u64::from(LittleEndian::read_u16(&head[1..3]));
        trace!(
            "Blob block at {:#x}: type {}, span {}, want {} bytes",
            block_at,
            block_type,
            span,
            blob.len
        );

        match block_type {
            SINGLE_BLOB => self.read_single(block_at, span, blob),
            SHARED_BLOB => self.read_shared(block_at, blob),
            FREE_BLOCK => Err(ParadoxError::bad_format(
                "blob reference points into a free block",
                block_at,
            )),
            other => Err(ParadoxError::bad_format(
                format!("unrecognized blob block type {}", other),
                block_at,
            )),
        }
    }

    fn read_single(&mut self, block_at: u64, span: u64, blob: &BlobRef) -> Result<BlobOutcome> {
        let mut rest = [0u8; 6];
        self.source.read_at(block_at + 3, &mut rest)?;
        let stored_len = LittleEndian::read_u32(&rest[0..4]);
        let modifier = LittleEndian::read_u16(&rest[4..6]);

        if modifier != blob.modifier {
            return Ok(BlobOutcome::ModifierMismatch {
                expected: blob.modifier,
                found: modifier,
            });
        }
        if stored_len != blob.len {
            return Err(ParadoxError::bad_format(
                format!(
                    "cell declares a {}-byte blob but the block stores {} bytes",
                    blob.len, stored_len
                ),
                block_at + 3,
            ));
        }
        if SINGLE_HEADER_LEN + u64::from(blob.len) > span.max(1) * MB_BLOCK_LEN {
            return Err(ParadoxError::bad_format(
                "blob payload exceeds its block span",
                block_at,
            ));
        }

        let payload = self
            .source
            .read_vec_at(block_at + SINGLE_HEADER_LEN, blob.len as usize)?;
        Ok(BlobOutcome::Payload(payload))
    }

    fn read_shared(&mut self, block_at: u64, blob: &BlobRef) -> Result<BlobOutcome> {
        let mut count_buf = [0u8; 2];
        self.source.read_at(block_at + 3, &mut count_buf)?;
        let entry_count = LittleEndian::read_u16(&count_buf);
        let index = u16::from(blob.index());
        if index >= entry_count {
            return Err(ParadoxError::bad_format(
                format!(
                    "blob index {} out of range; shared block holds {} entries",
                    index, entry_count
                ),
                block_at + 3,
            ));
        }

        let entry_at = block_at + SHARED_TABLE_AT + u64::from(index) * SHARED_ENTRY_LEN;
        let mut entry = [0u8; SHARED_ENTRY_LEN as usize];
        self.source.read_at(entry_at, &mut entry)?;
        let payload_at = block_at + u64::from(entry[0]) * 16;
        let rounded_units = u32::from(entry[1]);
        let modifier = LittleEndian::read_u16(&entry[2..4]);
        let remainder = u32::from(entry[4]);
        let stored_len = if remainder == 0 {
            rounded_units * 16
        } else {
            rounded_units.saturating_sub(1) * 16 + remainder
        };

        if modifier != blob.modifier {
            return Ok(BlobOutcome::ModifierMismatch {
                expected: blob.modifier,
                found: modifier,
            });
        }
        if stored_len != blob.len {
            return Err(ParadoxError::bad_format(
                format!(
                    "cell declares a {}-byte blob but the shared entry stores {} bytes",
                    blob.len, stored_len
                ),
                entry_at,
            ));
        }
        if payload_at + u64::from(blob.len) > block_at + MB_BLOCK_LEN {
            return Err(ParadoxError::bad_format(
                "shared blob payload exceeds its block",
                entry_at,
            ));
        }

        let payload = self.source.read_vec_at(payload_at, blob.len as usize)?;
        Ok(BlobOutcome::Payload(payload))
    }
}

/// Locates the companion `.MB` for a `.DB` path by case-insensitive match of
/// the base name with an `mb` extension in the same directory.
pub fn locate_companion(db_path: &Path) -> Option<std::path::PathBuf> {
    let stem = db_path.file_stem()?.to_str()?;
    let dir = db_path.parent()?;
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("mb"))
            .unwrap_or(false);
        let stem_matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case(stem))
            .unwrap_or(false);
        if ext_matches && stem_matches {
            return Some(path);
        }
    }
    None
}
