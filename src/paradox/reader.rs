//! The document handle: open → metadata → iterate → close.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use super::blob::{self, BlobResolver};
use super::crypto::Deobfuscator;
use super::error::{ParadoxError, Result, Warning};
use super::header;
use super::iter::Records;
use super::models::{FieldInfo, Header, Metadata, Schema};
use super::source::ByteSource;

/// Options accepted by [`ParadoxReader::open`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Codepage label overriding the one detected in the header, applied to
    /// all text decoding (field names included). E.g. `"cp866"`.
    pub encoding: Option<String>,
    /// Password for encrypted tables. Ignored for non-encrypted tables.
    pub password: Option<String>,
}

/// The open file handles and decryption state; dropped on `close()`.
pub(crate) struct Inner {
    pub(crate) db: ByteSource,
    pub(crate) mb: Option<BlobResolver>,
    pub(crate) key: Option<Deobfuscator>,
}

/// An open Paradox table.
///
/// Created by [`open`](Self::open); immutable thereafter. Records are read
/// through the lazy iterator returned by [`records`](Self::records). The
/// file handles are released by [`close`](Self::close) or on drop; every
/// operation on a closed handle fails with [`ParadoxError::InvalidHandle`].
///
/// # Thread safety
/// The handle may be moved between threads; iteration advances internal
/// state behind a mutex, so a single document should be driven from one
/// thread at a time.
pub struct ParadoxReader {
    inner: Mutex<Option<Inner>>,
    header: Header,
    schema: Schema,
    codepage: String,
    warnings: Mutex<Vec<Warning>>,
}

impl ParadoxReader {
    /// Opens a `.DB` table and, when the schema declares blob fields, its
    /// companion `.MB` (located by case-insensitive base-name match in the
    /// same directory).
    ///
    /// # Errors
    /// - [`ParadoxError::InvalidArgument`] for an empty path or blank
    ///   encoding label, rejected before any I/O
    /// - [`ParadoxError::Io`] when the file cannot be read
    ///   (message contains "File not found" for a missing file)
    /// - [`ParadoxError::BadFormat`] on structural violations
    /// - [`ParadoxError::Encrypted`] when the table is encrypted and no
    ///   password was supplied
    /// - [`ParadoxError::BadPassword`] when the password checksum does not
    ///   match the header word
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ParadoxError::InvalidArgument(
                "path must not be empty".to_string(),
            ));
        }
        if let Some(label) = options.encoding.as_deref() {
            if label.trim().is_empty() {
                return Err(ParadoxError::InvalidArgument(
                    "encoding label must not be blank".to_string(),
                ));
            }
        }

        info!("Opening Paradox table: {}", path.display());
        let mut db = ByteSource::open(path)?;
        let (header, schema, codepage, mut warnings) =
            header::parse(&mut db, options.encoding.as_deref())?;

        // The encryption word is a password checksum; zero means cleartext.
        // A password supplied for a cleartext table is accepted and ignored.
        let key = match header.encryption {
            0 => None,
            word => {
                let password = options.password.as_deref().ok_or(ParadoxError::Encrypted)?;
                Some(Deobfuscator::new(password, word)?)
            }
        };

        let mb = if schema.has_blobs() {
            match blob::locate_companion(path) {
                Some(mb_path) => {
                    debug!("Attaching blob file: {}", mb_path.display());
                    Some(BlobResolver::open(&mb_path)?)
                }
                None => {
                    let expected = path.with_extension("MB");
                    warn!(
                        "Table declares blob fields but {} is missing; blob cells will be Null",
                        expected.display()
                    );
                    warnings.push(Warning::MissingBlobFile { expected });
                    None
                }
            }
        } else {
            None
        };

        info!(
            "Table '{}' opened: {} fields, {} records declared{}",
            header.table_name,
            schema.field_count(),
            header.num_records,
            if key.is_some() { ", encrypted" } else { "" }
        );

        Ok(ParadoxReader {
            inner: Mutex::new(Some(Inner { db, mb, key })),
            header,
            schema,
            codepage,
            warnings: Mutex::new(warnings),
        })
    }

    /// Read-only metadata view. Idempotent; identical before and after
    /// iteration.
    pub fn metadata(&self) -> Result<Metadata> {
        self.ensure_open()?;
        Ok(Metadata {
            table_name: self.header.table_name.clone(),
            record_count: self.header.num_records,
            field_count: self.schema.field_count() as u16,
            codepage: self.codepage.clone(),
            fields: self
                .schema
                .fields()
                .iter()
                .map(|f| FieldInfo {
                    name: f.name.clone(),
                    kind: f.kind,
                    size: f.len,
                })
                .collect(),
        })
    }

    /// The resolved codepage label, e.g. `"CP866"`; empty when the header
    /// declares none and no override was given.
    pub fn codepage(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.codepage.clone())
    }

    /// Returns the lazy record iterator, walking the block linked list in
    /// primary order. Items are `Result<Record>`: structural errors abort
    /// iteration, non-fatal conditions accumulate as warnings instead.
    pub fn records(&self) -> Result<Records<'_>> {
        self.ensure_open()?;
        Ok(Records::new(self))
    }

    /// Non-fatal conditions collected so far (missing blob file, modifier
    /// mismatches, record-count disagreement, unknown field types).
    pub fn warnings(&self) -> Result<Vec<Warning>> {
        self.ensure_open()?;
        Ok(self.lock_warnings().clone())
    }

    /// Attaches a blob file by explicit path, replacing any auto-located
    /// companion.
    pub fn set_blob_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_open()?;
        let resolver = BlobResolver::open(path.as_ref())?;
        let mut guard = self.lock_inner();
        let inner = guard.as_mut().ok_or(ParadoxError::InvalidHandle)?;
        inner.mb = Some(resolver);
        Ok(())
    }

    /// Releases the file handles. Any later operation on this handle fails
    /// with [`ParadoxError::InvalidHandle`], including a second `close`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock_inner();
        match guard.take() {
            Some(_) => {
                info!("Closed table '{}'", self.header.table_name);
                Ok(())
            }
            None => Err(ParadoxError::InvalidHandle),
        }
    }

    pub(crate) fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn codepage_label(&self) -> &str {
        &self.codepage
    }

    pub(crate) fn lock_inner(&self) -> MutexGuard<'_, Option<Inner>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push_warning(&self, warning: Warning) {
        self.lock_warnings().push(warning);
    }

    fn lock_warnings(&self) -> MutexGuard<'_, Vec<Warning>> {
        self.warnings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.lock_inner().is_some() {
            Ok(())
        } else {
            Err(ParadoxError::InvalidHandle)
        }
    }
}

impl std::fmt::Debug for ParadoxReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParadoxReader")
            .field("table_name", &self.header.table_name)
            .field("fields", &self.schema.field_count())
            .field("records", &self.header.num_records)
            .field("closed", &self.lock_inner().is_none())
            .finish()
    }
}
