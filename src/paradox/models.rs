//! Data structures representing the Paradox table format.

use std::fmt;

/// File kind codes from header offset 0x04.
///
/// Only the data variants can be opened as tables; the index kinds are
/// recognized so that pointing the reader at a `.PX`/`.Xnn` file produces a
/// precise error instead of garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Data file with a primary index (`.PX` exists alongside).
    IndexedData,
    /// Primary index file.
    PrimaryIndex,
    /// Data file without a primary index.
    PlainData,
    /// Non-incrementing secondary index.
    NonIncSecondaryIndex,
    /// Secondary index.
    SecondaryIndex,
    /// Incrementing secondary index.
    IncSecondaryIndex,
    /// Non-incrementing secondary index, alternate layout.
    NonIncSecondaryIndexG,
    /// Secondary index, alternate layout.
    SecondaryIndexG,
    /// Incrementing secondary index, alternate layout.
    IncSecondaryIndexG,
}

impl FileKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::IndexedData),
            0x01 => Some(Self::PrimaryIndex),
            0x02 => Some(Self::PlainData),
            0x03 => Some(Self::NonIncSecondaryIndex),
            0x04 => Some(Self::SecondaryIndex),
            0x05 => Some(Self::IncSecondaryIndex),
            0x06 => Some(Self::NonIncSecondaryIndexG),
            0x07 => Some(Self::SecondaryIndexG),
            0x08 => Some(Self::IncSecondaryIndexG),
            _ => None,
        }
    }

    /// Whether this kind holds table data (as opposed to index structures).
    pub fn is_data(self) -> bool {
        matches!(self, Self::IndexedData | Self::PlainData)
    }
}

/// The closed set of Paradox field types, plus a carrier for codes this
/// crate does not know (cells of such fields decode to Null).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Alpha,
    Date,
    Short,
    Long,
    Currency,
    Number,
    Logical,
    Memo,
    Binary,
    FmtMemo,
    Ole,
    Graphic,
    Time,
    Timestamp,
    AutoInc,
    Bcd,
    Bytes,
    Unknown(u8),
}

impl FieldType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::Alpha,
            0x02 => Self::Date,
            0x03 => Self::Short,
            0x04 => Self::Long,
            0x05 => Self::Currency,
            0x06 => Self::Number,
            0x09 => Self::Logical,
            0x0C => Self::Memo,
            0x0D => Self::Binary,
            0x0E => Self::FmtMemo,
            0x0F => Self::Ole,
            0x10 => Self::Graphic,
            0x14 => Self::Time,
            0x15 => Self::Timestamp,
            0x16 => Self::AutoInc,
            0x17 => Self::Bcd,
            0x18 => Self::Bytes,
            other => Self::Unknown(other),
        }
    }

    /// Whether cells of this type reference the companion `.MB` file.
    pub fn is_blob(self) -> bool {
        matches!(
            self,
            Self::Memo | Self::Binary | Self::FmtMemo | Self::Ole | Self::Graphic
        )
    }

    /// Whether a resolved blob payload is text (recoded) rather than bytes.
    pub fn is_text_blob(self) -> bool {
        matches!(self, Self::Memo | Self::FmtMemo)
    }

    /// Stable type name as reported in metadata.
    pub fn name(self) -> &'static str {
        match self {
            Self::Alpha => "Alpha",
            Self::Date => "Date",
            Self::Short => "Short",
            Self::Long => "Long",
            Self::Currency => "Currency",
            Self::Number => "Number",
            Self::Logical => "Logical",
            Self::Memo => "Memo",
            Self::Binary => "Binary",
            Self::FmtMemo => "FmtMemo",
            Self::Ole => "Ole",
            Self::Graphic => "Graphic",
            Self::Time => "Time",
            Self::Timestamp => "Timestamp",
            Self::AutoInc => "Autoincrement",
            Self::Bcd => "BCD",
            Self::Bytes => "Bytes",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({:#04x})", code),
            other => f.write_str(other.name()),
        }
    }
}

/// One column of the table: name, type and physical cell width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    /// Field name, recoded to UTF-8.
    pub name: String,
    pub kind: FieldType,
    /// Physical cell width in bytes.
    pub len: u16,
    /// Fractional digit count for BCD fields, 0 otherwise.
    pub precision: u8,
}

/// Ordered sequence of field descriptors whose lengths sum to the record
/// width. Cell offsets within a record are precomputed at parse time.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldDesc>,
    offsets: Vec<u16>,
    record_len: u16,
}

impl Schema {
    pub(crate) fn new(fields: Vec<FieldDesc>) -> Self {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut pos = 0u16;
        for field in &fields {
            offsets.push(pos);
            pos += field.len;
        }
        Schema {
            fields,
            offsets,
            record_len: pos,
        }
    }

    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Sum of the declared field lengths; must equal the header record width.
    pub fn record_len(&self) -> u16 {
        self.record_len
    }

    /// Byte offset of a field's cell within a record.
    pub fn offset(&self, field: usize) -> u16 {
        self.offsets[field]
    }

    pub fn has_blobs(&self) -> bool {
        self.fields.iter().any(|f| f.kind.is_blob())
    }
}

/// Parsed fixed header of a `.DB` file. Built once, read-only.
#[derive(Debug, Clone)]
pub struct Header {
    /// Record width in bytes (0x00).
    pub record_len: u16,
    /// Total header size in bytes; the first data block starts here (0x02).
    pub header_len: u16,
    /// File kind code (0x04).
    pub file_kind: FileKind,
    /// Data block size in bytes: 1024 × the block-size selector (0x05).
    pub block_len: u32,
    /// Declared number of records (0x06).
    pub num_records: u32,
    /// Next block to allocate (0x0A).
    pub next_block: u16,
    /// Total blocks allocated in the file (0x0C).
    pub file_blocks: u16,
    /// First data block of the linked list, 1-based; 0 means no data (0x0E).
    pub first_block: u16,
    /// Last data block of the linked list (0x10).
    pub last_block: u16,
    /// Modification counter (0x14).
    pub modify_count: u16,
    /// File version id (0x21).
    pub file_version: u8,
    /// Password checksum; 0 means not encrypted (0x22).
    pub encryption: u32,
    /// Auto-increment refinement flag (0x2B).
    pub auto_inc_flag: u8,
    /// Number of indexed fields (0x2E).
    pub indexed_fields: u8,
    /// Header layout version; ≥ 4 has the extended header, ≥ 5 carries a
    /// codepage (0x30).
    pub header_version: u16,
    /// Declared field count (0x38).
    pub field_count: u8,
    /// Primary key field count (0x39).
    pub key_fields: u8,
    /// DOS codepage id, 0 when unknown (0x3C, header version ≥ 5 only).
    pub codepage: u16,
    /// Table name from the header name region, recoded to UTF-8.
    pub table_name: String,
    /// Derived: how many record slots fit in one block.
    pub records_per_block: u16,
}

/// A decoded cell value. The tagged variant set mirrors the neutral value
/// model: callers pattern-match, no downcasting.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Days since 1970-01-01.
    Date(i32),
    /// Seconds since 1970-01-01 00:00:00 UTC.
    Timestamp(f64),
    /// Seconds since midnight.
    Time(f64),
    /// UTF-8 text, codepage-recoded.
    Text(String),
    /// Raw inline bytes (the `Bytes` field type).
    Bytes(Vec<u8>),
    /// Binary blob payload resolved from the `.MB` file or the inline tail.
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Reference to a blob payload, parsed from the trailing ten bytes of a
/// blob-bearing cell. Input to the blob resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// The raw 4-byte offset descriptor from the cell.
    pub descriptor: u32,
    /// Declared payload length in bytes.
    pub len: u32,
    /// Identity check value; must match the `.MB` entry.
    pub modifier: u16,
    /// Inline leader bytes carried in the cell itself.
    pub tail: Vec<u8>,
}

impl BlobRef {
    /// Index of the entry within a multi-blob block (low descriptor byte).
    pub fn index(&self) -> u8 {
        (self.descriptor & 0xFF) as u8
    }

    /// Absolute byte offset of the target block in the `.MB` file.
    pub fn block_offset(&self) -> u64 {
        u64::from(self.descriptor & !0xFFF)
    }
}

/// One column in the metadata view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub kind: FieldType,
    pub size: u16,
}

/// Read-only metadata view of an open document.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub table_name: String,
    pub record_count: u32,
    pub field_count: u16,
    /// Resolved codepage label, e.g. `"CP866"`; empty when unknown.
    pub codepage: String,
    pub fields: Vec<FieldInfo>,
}

/// One decoded row. Values are owned by the caller; the record is detached
/// from the block buffer it was sliced from.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    index: u32,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(index: u32, values: Vec<Value>) -> Self {
        Record { index, values }
    }

    /// Logical index of this record within the file, 0-based.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The value of one field, or `None` if the index is out of range.
    pub fn value(&self, field: usize) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// A fully materialized table, as produced by the one-shot API.
#[derive(Debug, Clone)]
pub struct Table {
    pub metadata: Metadata,
    pub records: Vec<Record>,
}
