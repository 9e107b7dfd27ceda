//! Fixed-header and field-descriptor parsing for `.DB` files.
//!
//! The fixed header occupies 0x58 bytes; header version ≥ 4 appends a
//! 0x20-byte extension, so the field-descriptor table begins at 0x78 for
//! modern files and 0x58 for version 3 files. All multi-byte header fields
//! are little-endian.
//!
//! Region layout after the descriptors:
//!
//! ```text
//! [field_count × (type u8, length u8)]   field descriptors
//! [u32]                                  table-name pointer   (skipped)
//! [field_count × u32]                    field-name pointers  (skipped)
//! [79 bytes]                             NUL-terminated table name
//! [field_count × NUL-terminated string]  field names (codepage bytes)
//! [index/sort-order bytes]               ignored
//! ```

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace, warn};

use super::encoding;
use super::error::{ParadoxError, Result, Warning};
use super::models::{FieldDesc, FieldType, FileKind, Header, Schema};
use super::source::ByteSource;

/// Size of the version-3 fixed header.
const BASE_HEADER_LEN: usize = 0x58;
/// Size of the fixed header with the version ≥ 4 extension.
const EXTENDED_HEADER_LEN: usize = 0x78;
/// Width of the NUL-terminated, zero-padded table-name region.
const TABLE_NAME_LEN: usize = 79;
/// Physical width of a BCD cell; the descriptor length byte holds the
/// fractional digit count instead.
const BCD_CELL_LEN: u16 = 17;

/// Parses the header and field-descriptor table from the start of the file.
///
/// `codepage_override` replaces the header-declared codepage for all text
/// recoding, including the table and field names parsed here.
///
/// # Errors
/// Returns [`ParadoxError::BadFormat`] on any structural violation: an
/// unrecognized file kind, a block-size selector out of range, a record
/// width that does not equal the sum of the field lengths, or a name region
/// that leaves the declared header size.
pub fn parse(
    source: &mut ByteSource,
    codepage_override: Option<&str>,
) -> Result<(Header, Schema, String, Vec<Warning>)> {
    let mut fixed = [0u8; BASE_HEADER_LEN];
    source.read_at(0, &mut fixed)?;

    let record_len = LittleEndian::read_u16(&fixed[0x00..0x02]);
    let header_len = LittleEndian::read_u16(&fixed[0x02..0x04]);
    let file_kind_code = fixed[0x04];
    let block_size_selector = fixed[0x05];
    let num_records = LittleEndian::read_u32(&fixed[0x06..0x0A]);
    let next_block = LittleEndian::read_u16(&fixed[0x0A..0x0C]);
    let file_blocks = LittleEndian::read_u16(&fixed[0x0C..0x0E]);
    let first_block = LittleEndian::read_u16(&fixed[0x0E..0x10]);
    let last_block = LittleEndian::read_u16(&fixed[0x10..0x12]);
    let modify_count = LittleEndian::read_u16(&fixed[0x14..0x16]);
    let file_version = fixed[0x21];
    let encryption = LittleEndian::read_u32(&fixed[0x22..0x26]);
    let auto_inc_flag = fixed[0x2B];
    let indexed_fields = fixed[0x2E];
    let header_version = LittleEndian::read_u16(&fixed[0x30..0x32]);
    let field_count = fixed[0x38];
    let key_fields = fixed[0x39];
    let codepage = if header_version >= 5 {
        LittleEndian::read_u16(&fixed[0x3C..0x3E])
    } else {
        0
    };

    let file_kind = FileKind::from_code(file_kind_code).ok_or_else(|| {
        ParadoxError::bad_format(
            format!("unrecognized file kind code {:#04x}", file_kind_code),
            0x04,
        )
    })?;
    if !file_kind.is_data() {
        return Err(ParadoxError::bad_format(
            format!("{:?} is an index file, not a data file", file_kind),
            0x04,
        ));
    }

    if !(1..=32).contains(&block_size_selector) {
        return Err(ParadoxError::bad_format(
            format!(
                "block-size selector {} out of range 1..=32",
                block_size_selector
            ),
            0x05,
        ));
    }
    let block_len = 1024 * u32::from(block_size_selector);

    if field_count == 0 {
        return Err(ParadoxError::bad_format("table declares zero fields", 0x38));
    }

    let descriptors_at = if header_version >= 4 {
        EXTENDED_HEADER_LEN
    } else {
        BASE_HEADER_LEN
    };
    debug!(
        "Header: kind={:?}, version={}, {} fields, {} records, block {} bytes, codepage {}",
        file_kind, header_version, field_count, num_records, block_len, codepage
    );

    if usize::from(header_len) < descriptors_at + usize::from(field_count) * 2 {
        return Err(ParadoxError::bad_format(
            format!(
                "declared header size {} cannot hold {} field descriptors",
                header_len, field_count
            ),
            0x02,
        ));
    }

    // Read the remainder of the header region in one shot; names and
    // descriptors are sliced out of it.
    let region = source.read_vec_at(
        descriptors_at as u64,
        usize::from(header_len) - descriptors_at,
    )?;

    let codepage_label = encoding::resolve_label(codepage, codepage_override);
    let mut warnings = Vec::new();
    let (schema, table_name) = parse_descriptors(
        &region,
        descriptors_at as u64,
        field_count,
        header_len,
        &codepage_label,
        &mut warnings,
    )?;

    if schema.record_len() != record_len {
        return Err(ParadoxError::bad_format(
            format!(
                "field lengths sum to {} but the header declares a record width of {}",
                schema.record_len(),
                record_len
            ),
            0x00,
        ));
    }

    if u32::from(record_len) + blocks_head_len() > block_len {
        return Err(ParadoxError::bad_format(
            format!(
                "record width {} does not fit in a {}-byte block",
                record_len, block_len
            ),
            0x00,
        ));
    }
    let records_per_block = ((block_len - blocks_head_len()) / u32::from(record_len)) as u16;

    let header = Header {
        record_len,
        header_len,
        file_kind,
        block_len,
        num_records,
        next_block,
        file_blocks,
        first_block,
        last_block,
        modify_count,
        file_version,
        encryption,
        auto_inc_flag,
        indexed_fields,
        header_version,
        field_count,
        key_fields,
        codepage,
        table_name,
        records_per_block,
    };

    Ok((header, schema, codepage_label, warnings))
}

fn blocks_head_len() -> u32 {
    super::blocks::BLOCK_HEAD_LEN as u32
}

/// Parses the descriptor table, skips the pointer area, and reads the table
/// and field names. `region` starts at file offset `region_at`.
fn parse_descriptors(
    region: &[u8],
    region_at: u64,
    field_count: u8,
    header_len: u16,
    codepage_label: &str,
    warnings: &mut Vec<Warning>,
) -> Result<(Schema, String)> {
    let n = usize::from(field_count);
    let mut fields = Vec::with_capacity(n);

    for i in 0..n {
        let code = region[i * 2];
        let len_byte = region[i * 2 + 1];
        let kind = FieldType::from_code(code);
        // The BCD descriptor byte holds the precision; the cell is 17 bytes.
        let (len, precision) = if kind == FieldType::Bcd {
            (BCD_CELL_LEN, len_byte)
        } else {
            (u16::from(len_byte), 0)
        };
        if len == 0 {
            return Err(ParadoxError::bad_format(
                format!("field {} declares a zero length", i),
                region_at + (i * 2 + 1) as u64,
            ));
        }
        fields.push(FieldDesc {
            name: String::new(),
            kind,
            len,
            precision,
        });
    }

    // Table-name pointer and one name pointer per field; only the offsets
    // matter, the pointer values are file-writer bookkeeping.
    let mut pos = n * 2 + 4 + n * 4;

    let name_region_end = usize::from(header_len) - region_at as usize;
    if pos + TABLE_NAME_LEN > name_region_end {
        return Err(ParadoxError::bad_format(
            "table-name region extends past the declared header size",
            region_at + pos as u64,
        ));
    }
    let table_name_bytes = &region[pos..pos + TABLE_NAME_LEN];
    let table_name_bytes = match table_name_bytes.iter().position(|&b| b == 0) {
        Some(end) => &table_name_bytes[..end],
        None => table_name_bytes,
    };
    let table_name = encoding::recode(table_name_bytes, codepage_label).into_owned();
    pos += TABLE_NAME_LEN;

    for (i, field) in fields.iter_mut().enumerate() {
        let rest = &region[pos.min(name_region_end)..name_region_end];
        let end = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            ParadoxError::bad_format(
                format!("field name {} extends past the declared header size", i),
                region_at + pos as u64,
            )
        })?;
        field.name = encoding::recode(&rest[..end], codepage_label).into_owned();
        trace!("Field {}: '{}' {:?} len {}", i, field.name, field.kind, field.len);
        if let FieldType::Unknown(code) = field.kind {
            warn!(
                "Field '{}' has unknown type code {:#04x}; cells will be Null",
                field.name, code
            );
            warnings.push(Warning::UnknownFieldType {
                field: field.name.clone(),
                code,
            });
        }
        pos += end + 1;
    }

    Ok((Schema::new(fields), table_name))
}
