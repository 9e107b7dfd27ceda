//! Error and warning types for the paradox-reader crate.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum ParadoxError {
    /// An error originating from I/O operations on the `.DB` or `.MB` file.
    #[error("{}", io_message(.path, .source))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is structurally invalid or does not conform to the Paradox
    /// table format.
    #[error("Invalid Paradox format at offset {offset:#x}: {reason}")]
    BadFormat { reason: String, offset: u64 },

    /// The file is encrypted, but no password was supplied.
    #[error("File is password protected; a password is required to open it")]
    Encrypted,

    /// The supplied password does not match the checksum stored in the header.
    #[error("Incorrect password")]
    BadPassword,

    /// An operation was attempted on a closed document handle.
    #[error("Operation on a closed document handle")]
    InvalidHandle,

    /// An option had the wrong shape and was rejected before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ParadoxError {
    /// Wraps an I/O error with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ParadoxError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn bad_format(reason: impl Into<String>, offset: u64) -> Self {
        ParadoxError::BadFormat {
            reason: reason.into(),
            offset,
        }
    }
}

fn io_message(path: &PathBuf, source: &std::io::Error) -> String {
    if source.kind() == std::io::ErrorKind::NotFound {
        format!("File not found: {}", path.display())
    } else {
        format!("I/O error on {}: {}", path.display(), source)
    }
}

/// A convenience `Result` type alias using the crate's [`ParadoxError`] type.
pub type Result<T> = std::result::Result<T, ParadoxError>;

/// Non-fatal conditions collected on the document while opening or iterating.
///
/// Warnings never interrupt control flow; the affected cells decode to
/// `Value::Null` and iteration continues. They are exposed through
/// [`ParadoxReader::warnings`](crate::ParadoxReader::warnings).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    /// The schema declares blob fields but no companion `.MB` file was found.
    #[error("Blob fields declared but no blob file was found (expected {})", .expected.display())]
    MissingBlobFile { expected: PathBuf },

    /// A blob entry in the `.MB` file did not carry the modifier recorded in
    /// the data cell pointing at it.
    #[error("Blob modifier mismatch in field '{field}' at record {record}: cell has {expected}, blob file has {found}")]
    BlobModifierMismatch {
        field: String,
        record: u32,
        expected: u16,
        found: u16,
    },

    /// The number of records yielded by iteration differs from the count
    /// declared in the header.
    #[error("Header declares {declared} records but iteration produced {found}")]
    RecordCountMismatch { declared: u32, found: u32 },

    /// A field descriptor carried a type code this crate does not know.
    /// Cells of this field decode to Null.
    #[error("Field '{field}' has unknown type code {code:#04x}; its cells decode to Null")]
    UnknownFieldType { field: String, code: u8 },
}
