use std::{fs::File, ops::Range, path::Path};

use memmap2::Mmap;

use crate::core::{ConfError, Result};

/// Size of the fixed table-of-tables at the start of every database.
pub(crate) const HEADER_SIZE: usize = 2048;

const TABLE_COUNT: usize = 256;
const RECORD_HEADER_SIZE: usize = 8;
const SLOT_SIZE: usize = 8;

/// The classic cdb hash: `h = ((h << 5) + h) ^ byte`, seeded with 5381.
pub(crate) fn hash(key: &[u8]) -> u32 {
    key.iter()
        .fold(5381u32, |h, &b| h.wrapping_shl(5).wrapping_add(h) ^ u32::from(b))
}

fn read_u32(buf: &[u8], pos: usize) -> Option<u32> {
    let bytes = buf.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_pair(buf: &[u8], pos: usize) -> Option<(usize, usize)> {
    let a = read_u32(buf, pos)?;
    let b = read_u32(buf, pos + 4)?;
    Some((a as usize, b as usize))
}

/// Read-only constant database over a memory-mapped file.
///
/// The mapping is never written. Publishers replace the file by rename, so
/// the inode backing an open reader stays intact until the reader is dropped.
pub(crate) struct CdbReader {
    mmap: Mmap,
}

impl CdbReader {
    /// Maps `path` and validates the table headers and every record frame.
    ///
    /// # Errors
    /// Returns `ConfError::Open` if the file cannot be mapped or its layout is
    /// inconsistent.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ConfError::open(path, e))?;

        // SAFETY: the mapping is read-only and publishers never modify a file
        // in place; a replacement arrives as a new inode via rename.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ConfError::open(path, e))?;

        let reader = Self { mmap };
        reader
            .validate()
            .map_err(|details| ConfError::open(path, format!("invalid index: {details}")))?;

        Ok(reader)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let buf = &self.mmap[..];
        if buf.len() < HEADER_SIZE {
            return Err(format!("file is {} bytes, shorter than the header", buf.len()));
        }

        let mut records_end = buf.len();
        for table in 0..TABLE_COUNT {
            let (pos, slots) =
                read_pair(buf, table * 8).ok_or_else(|| format!("table {table} unreadable"))?;

            let end = slots
                .checked_mul(SLOT_SIZE)
                .and_then(|len| pos.checked_add(len))
                .ok_or_else(|| format!("table {table} size overflows"))?;

            if pos < HEADER_SIZE || end > buf.len() {
                return Err(format!("table {table} at {pos}+{slots} slots is out of bounds"));
            }

            records_end = records_end.min(pos);
        }

        let mut pos = HEADER_SIZE;
        while pos < records_end {
            let frame_end = pos + RECORD_HEADER_SIZE;
            if frame_end > records_end {
                return Err(format!("record at {pos} is shorter than its header"));
            }

            let (klen, dlen) =
                read_pair(buf, pos).ok_or_else(|| format!("record at {pos} unreadable"))?;

            pos = klen
                .checked_add(dlen)
                .and_then(|len| frame_end.checked_add(len))
                .filter(|&end| end <= records_end)
                .ok_or_else(|| format!("record at {} overruns the record area", frame_end - 8))?;
        }

        Ok(())
    }

    /// Finds the byte range of the value stored under `key`.
    ///
    /// Only the first value is returned for keys stored more than once.
    ///
    /// # Errors
    /// Returns `ConfError::CorruptIndex` when a slot or record points outside
    /// the mapping.
    pub(crate) fn find(&self, key: &[u8]) -> Result<Option<Range<usize>>> {
        let buf = &self.mmap[..];
        let h = hash(key);

        let corrupt = |details: String| ConfError::CorruptIndex { details };

        let (table_pos, slots) = read_pair(buf, (h as usize % TABLE_COUNT) * 8)
            .ok_or_else(|| corrupt("header unreadable".into()))?;
        if slots == 0 {
            return Ok(None);
        }

        let mut slot = (h as usize >> 8) % slots;
        for _ in 0..slots {
            let slot_pos = table_pos + slot * SLOT_SIZE;
            let (slot_hash, record_pos) = read_pair(buf, slot_pos)
                .ok_or_else(|| corrupt(format!("slot at {slot_pos} out of bounds")))?;

            if record_pos == 0 {
                return Ok(None);
            }

            if slot_hash as u32 == h {
                let (klen, dlen) = read_pair(buf, record_pos)
                    .ok_or_else(|| corrupt(format!("record at {record_pos} out of bounds")))?;

                let key_start = record_pos + RECORD_HEADER_SIZE;
                let data_start = key_start + klen;
                let data_end = data_start + dlen;
                if data_end > buf.len() {
                    return Err(corrupt(format!("record at {record_pos} overruns the file")));
                }

                if &buf[key_start..data_start] == key {
                    return Ok(Some(data_start..data_end));
                }
            }

            slot = (slot + 1) % slots;
        }

        Ok(None)
    }

    /// Returns the bytes in `range`, which must come from [`CdbReader::find`].
    pub(crate) fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.mmap[range]
    }
}
