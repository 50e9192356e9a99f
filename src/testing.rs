//! Fixture helpers for building databases.
//!
//! Nothing here touches a loaded module: the helpers write brand-new files
//! and publish them the way the real publisher does, by renaming a finished
//! temporary file over the target.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Path, PathBuf},
};

use crate::store::cdb::{HEADER_SIZE, hash};

/// Builds a constant database in memory.
#[derive(Debug, Default)]
pub struct CdbWriter {
    records: Vec<(Vec<u8>, Vec<u8>)>,
}

impl CdbWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record. Values are stored verbatim, type tag included.
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> &mut Self {
        self.records
            .push((key.as_ref().to_vec(), value.as_ref().to_vec()));
        self
    }

    /// Serialises the database.
    ///
    /// # Errors
    /// Returns `InvalidData` if the database would not fit 32-bit offsets.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let too_big = || io::Error::new(io::ErrorKind::InvalidData, "database exceeds 4 GiB");
        let to_u32 = |n: usize| u32::try_from(n).map_err(|_| too_big());

        let mut out = vec![0u8; HEADER_SIZE];
        let mut buckets: Vec<Vec<(u32, u32)>> = vec![Vec::new(); 256];

        for (key, value) in &self.records {
            let pos = to_u32(out.len())?;
            let h = hash(key);

            out.extend_from_slice(&to_u32(key.len())?.to_le_bytes());
            out.extend_from_slice(&to_u32(value.len())?.to_le_bytes());
            out.extend_from_slice(key);
            out.extend_from_slice(value);

            buckets[h as usize % 256].push((h, pos));
        }

        let mut header = Vec::with_capacity(HEADER_SIZE);
        for bucket in &buckets {
            let slots = bucket.len() * 2;
            let mut table = vec![(0u32, 0u32); slots];

            for &(h, pos) in bucket {
                let mut slot = (h as usize >> 8) % slots;
                while table[slot].1 != 0 {
                    slot = (slot + 1) % slots;
                }
                table[slot] = (h, pos);
            }

            header.extend_from_slice(&to_u32(out.len())?.to_le_bytes());
            header.extend_from_slice(&to_u32(slots)?.to_le_bytes());

            for (h, pos) in table {
                out.extend_from_slice(&h.to_le_bytes());
                out.extend_from_slice(&pos.to_le_bytes());
            }
        }

        out[..HEADER_SIZE].copy_from_slice(&header);
        Ok(out)
    }

    /// Writes the database to a temporary sibling of `path` and renames it
    /// into place.
    ///
    /// # Errors
    /// Returns any I/O error from writing or renaming.
    pub fn publish(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let tmp = temp_sibling(path);

        fs::write(&tmp, self.to_bytes()?)?;
        fs::rename(&tmp, path)
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Builds a database from plain-text parameters, adding the child lists
/// used for subtree traversal.
///
/// Every value is stored with the text tag. Each directory `D` gets a JSON
/// array of its sorted child names under `D/`, and the root list lives
/// under `/`.
pub fn text_tree<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>) -> CdbWriter {
    let mut writer = CdbWriter::new();
    let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (path, value) in params {
        writer.put(path, format!("s{value}"));

        let mut dir = path;
        while let Some((parent, item)) = dir.rsplit_once('/') {
            let parent = if parent.is_empty() { "/" } else { parent };
            children
                .entry(parent.to_string())
                .or_default()
                .insert(item.to_string());

            if parent == "/" {
                break;
            }
            dir = parent;
        }
    }

    for (dir, items) in children {
        let list_key = if dir == "/" { dir } else { format!("{dir}/") };
        let items: Vec<&String> = items.iter().collect();
        let json = serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string());
        writer.put(list_key, format!("j{json}"));
    }

    writer
}
