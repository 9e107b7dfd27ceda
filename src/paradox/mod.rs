//! Core Paradox table decoding.

pub mod error;
pub mod models;

mod blob;
mod blocks;
mod crypto;
mod encoding;
mod fields;
mod header;
mod iter;
mod reader;
mod source;

pub use error::{ParadoxError, Result, Warning};
pub use iter::Records;
pub use models::{
    BlobRef, FieldDesc, FieldInfo, FieldType, FileKind, Header, Metadata, Record, Schema, Table,
    Value,
};
pub use reader::{OpenOptions, ParadoxReader};
