use std::{
    fmt,
    ops::{Deref, Range},
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use super::cdb::CdbReader;
use crate::core::{ConfError, Result};

/// Encoding of a stored value, taken from its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    /// `s`: plain text, including numbers and booleans
    Text,
    /// `j`: JSON (YAML sources are normalised to JSON by the publisher)
    Json,
    /// Any other tag byte
    Other(u8),
}

impl ValueFormat {
    /// Interprets a type tag byte.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            b's' => ValueFormat::Text,
            b'j' => ValueFormat::Json,
            other => ValueFormat::Other(other),
        }
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueFormat::Text => write!(f, "text"),
            ValueFormat::Json => write!(f, "JSON"),
            ValueFormat::Other(tag) => write!(f, "unknown format {tag:#04x}"),
        }
    }
}

/// A stored value split into its type tag and payload.
///
/// The payload borrows the snapshot it was read from.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Encoding named by the type tag
    pub format: ValueFormat,
    /// Bytes after the type tag; may be empty
    pub data: &'a [u8],
}

/// One immutable loaded instance of a backing database.
pub struct Snapshot {
    reader: CdbReader,
    path: PathBuf,
    opened_at: SystemTime,
}

impl Snapshot {
    /// Opens and validates the database at `path`.
    ///
    /// Validation covers the index and record framing only. A zero-length
    /// value is accepted here and reported as `ConfError::CorruptRecord`
    /// when it is looked up.
    ///
    /// # Errors
    /// Returns `ConfError::Open` if the file is missing, unreadable or has an
    /// invalid index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        Ok(Self {
            reader: CdbReader::open(path)?,
            path: path.to_path_buf(),
            opened_at: SystemTime::now(),
        })
    }

    /// Path the snapshot was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time the snapshot was loaded.
    pub fn opened_at(&self) -> SystemTime {
        self.opened_at
    }

    /// Raw value bytes, including the type tag, or `None` if absent.
    ///
    /// A present but zero-length value is returned as an empty slice; it is
    /// distinct from an absent key.
    ///
    /// # Errors
    /// Returns `ConfError::CorruptIndex` if the index is inconsistent.
    pub fn raw(&self, path: &str) -> Result<Option<&[u8]>> {
        Ok(self
            .reader
            .find(path.as_bytes())?
            .map(|range| self.reader.bytes(range)))
    }

    /// The tagged record stored at `path`.
    ///
    /// # Errors
    /// Returns `ConfError::CorruptRecord` for a value without a type tag and
    /// `ConfError::CorruptIndex` if the index is inconsistent.
    pub fn record(&self, path: &str) -> Result<Option<Record<'_>>> {
        let Some(raw) = self.raw(path)? else {
            return Ok(None);
        };

        let Some((&tag, data)) = raw.split_first() else {
            return Err(ConfError::CorruptRecord {
                path: path.to_string(),
            });
        };

        Ok(Some(Record {
            format: ValueFormat::from_tag(tag),
            data,
        }))
    }

    fn find(&self, path: &str) -> Result<Option<Range<usize>>> {
        self.reader.find(path.as_bytes())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("path", &self.path)
            .field("opened_at", &self.opened_at)
            .finish_non_exhaustive()
    }
}

/// Raw value bytes that keep their snapshot alive.
///
/// A `RawValue` is a view into the memory map of the snapshot it was read
/// from. Holding it pins that snapshot, even after the module has reloaded;
/// drop it promptly to let superseded mappings go.
#[derive(Clone)]
pub struct RawValue {
    snapshot: Arc<Snapshot>,
    range: Range<usize>,
}

impl RawValue {
    /// Looks up `path` in `snapshot`.
    ///
    /// # Errors
    /// Returns `ConfError::CorruptIndex` if the index is inconsistent.
    pub fn lookup(snapshot: &Arc<Snapshot>, path: &str) -> Result<Option<Self>> {
        Ok(snapshot.find(path)?.map(|range| Self {
            snapshot: Arc::clone(snapshot),
            range,
        }))
    }

    /// Encoding named by the type tag, or `None` for an untagged value.
    pub fn format(&self) -> Option<ValueFormat> {
        self.first().copied().map(ValueFormat::from_tag)
    }

    /// Bytes after the type tag.
    pub fn data(&self) -> &[u8] {
        self.get(1..).unwrap_or_default()
    }

    /// The snapshot this value was read from.
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }
}

impl Deref for RawValue {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.snapshot.reader.bytes(self.range.clone())
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawValue")
            .field("path", &self.snapshot.path)
            .field("bytes", &String::from_utf8_lossy(self))
            .finish()
    }
}
