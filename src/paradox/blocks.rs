//! Data-block topology: offsets, block heads, records-used arithmetic.
//!
//! A `.DB` file is a fixed header followed by equally sized data blocks,
//! chained through next/previous pointers into a linked list. Each block
//! starts with a 6-byte head; the payload is `records_per_block` record
//! slots of which the first `records_used` are live.

use byteorder::{ByteOrder, LittleEndian};

use super::error::{ParadoxError, Result};
use super::models::Header;

/// Size of the per-block head: next (2), previous (2), record-offset
/// indicator (2).
pub const BLOCK_HEAD_LEN: usize = 6;

/// Parsed head of one data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHead {
    /// 1-based index of the next block in the chain; 0 terminates.
    pub next: u16,
    /// 1-based index of the previous block; 0 at the chain head.
    pub prev: u16,
    /// Number of live records in this block.
    pub records_used: u16,
}

/// Absolute byte offset of a 1-based data block.
pub fn block_offset(header: &Header, block_no: u16) -> u64 {
    u64::from(header.header_len) + u64::from(block_no - 1) * u64::from(header.block_len)
}

/// Parse a block head from the first [`BLOCK_HEAD_LEN`] bytes of a block.
///
/// A negative offset indicator (0xFFFF read as signed) marks an empty block;
/// it stays in the chain with `records_used == 0` and the iterator skips it.
///
/// The offset indicator stores `(records_used − 1) × record_len`; it must be
/// a multiple of the record width and the derived count must fit the block.
pub fn parse_block_head(buf: &[u8], header: &Header, offset: u64) -> Result<BlockHead> {
    let next = LittleEndian::read_u16(&buf[0..2]);
    let prev = LittleEndian::read_u16(&buf[2..4]);
    let indicator = LittleEndian::read_i16(&buf[4..6]);

    if indicator < 0 {
        return Ok(BlockHead {
            next,
            prev,
            records_used: 0,
        });
    }

    let indicator = indicator as u16;
    let record_len = header.record_len;
    if record_len == 0 || indicator % record_len != 0 {
        return Err(ParadoxError::bad_format(
            format!(
                "block record-offset indicator {} is not a multiple of the record width {}",
                indicator, record_len
            ),
            offset + 4,
        ));
    }

    let records_used = indicator / record_len + 1;
    if records_used > header.records_per_block {
        return Err(ParadoxError::bad_format(
            format!(
                "block declares {} records but only {} fit in a block",
                records_used, header.records_per_block
            ),
            offset + 4,
        ));
    }

    Ok(BlockHead {
        next,
        prev,
        records_used,
    })
}
