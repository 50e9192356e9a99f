use crate::{
    core::Result,
    module::Decode,
    path::{child_list_key, child_path},
    store::Snapshot,
};

/// Values up to this many raw bytes are compared directly instead of hashed.
pub const INLINE_LIMIT: usize = 128;

const VALUE_MARKER: u8 = b'v';
const CHILD_MARKER: u8 = b'c';

/// A compact stand-in for a path's value (or subtree) in one snapshot.
///
/// Two fingerprints are equal exactly when the representation and the
/// bytes agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// No value at the path
    Absent,
    /// The raw record, type tag included
    Inline(Box<[u8]>),
    /// BLAKE3 digest of a long record or of a whole subtree
    Digest([u8; 32]),
}

impl Fingerprint {
    /// Fingerprint of the single record at `path`.
    ///
    /// # Errors
    /// Returns `ConfError::CorruptIndex` if the lookup fails.
    pub fn of_value(snapshot: &Snapshot, path: &str) -> Result<Self> {
        Ok(match snapshot.raw(path)? {
            None => Fingerprint::Absent,
            Some(raw) if raw.len() <= INLINE_LIMIT => Fingerprint::Inline(raw.into()),
            Some(raw) => Fingerprint::Digest(*blake3::hash(raw).as_bytes()),
        })
    }

    /// Digest of `path` and every descendant reachable through child lists.
    ///
    /// Descendants are visited depth first in child-list order. Each present
    /// value contributes a value marker, its length and raw bytes, so an
    /// empty value and a missing one hash differently. Each child name is
    /// hashed behind its own marker and can never be read as a value.
    ///
    /// # Errors
    /// Returns an error if a child list cannot be decoded or a lookup fails.
    pub fn of_subtree(snapshot: &Snapshot, path: &str) -> Result<Self> {
        let mut hasher = blake3::Hasher::new();
        hash_subtree(snapshot, path, &mut hasher)?;
        Ok(Fingerprint::Digest(*hasher.finalize().as_bytes()))
    }

    /// Returns true if the fingerprint holds a digest.
    pub fn is_hashed(&self) -> bool {
        matches!(self, Fingerprint::Digest(_))
    }
}

fn hash_subtree(snapshot: &Snapshot, path: &str, hasher: &mut blake3::Hasher) -> Result<()> {
    if let Some(raw) = snapshot.raw(path)? {
        hasher.update(&[VALUE_MARKER]);
        hasher.update(&(raw.len() as u64).to_le_bytes());
        hasher.update(raw);
    }

    for child in child_names(snapshot, path)? {
        hasher.update(&[CHILD_MARKER]);
        hasher.update(&(child.len() as u64).to_le_bytes());
        hasher.update(child.as_bytes());
        hash_subtree(snapshot, &child_path(path, &child), hasher)?;
    }

    Ok(())
}

fn child_names(snapshot: &Snapshot, path: &str) -> Result<Vec<String>> {
    let key = child_list_key(path);

    match snapshot.record(&key)? {
        Some(record) => Vec::<String>::decode(&key, record),
        None => Ok(Vec::new()),
    }
}
