//! Unit tests for the cdb reader and snapshot records.

#![allow(clippy::unwrap_used)]

use std::{fs, sync::Arc};

use tempfile::TempDir;

use crate::{
    core::ConfError,
    store::{RawValue, Snapshot, ValueFormat, cdb::HEADER_SIZE},
    testing::CdbWriter,
};

fn write_db(dir: &TempDir, writer: &CdbWriter) -> std::path::PathBuf {
    let path = dir.path().join("test.cdb");
    writer.publish(&path).unwrap();
    path
}

mod lookups {
    use super::*;

    #[test]
    fn finds_present_keys_and_misses_absent_ones() {
        let dir = TempDir::new().unwrap();
        let mut writer = CdbWriter::new();
        writer.put("/a", "s1").put("/b/c", "j{\"x\":1}");

        let snapshot = Snapshot::open(write_db(&dir, &writer)).unwrap();

        assert_eq!(snapshot.raw("/a").unwrap(), Some(&b"s1"[..]));
        assert_eq!(snapshot.raw("/b/c").unwrap(), Some(&b"j{\"x\":1}"[..]));
        assert_eq!(snapshot.raw("/missing").unwrap(), None);
    }

    #[test]
    fn survives_many_keys_sharing_tables() {
        let dir = TempDir::new().unwrap();
        let mut writer = CdbWriter::new();
        for i in 0..2000 {
            writer.put(format!("/key/{i}"), format!("s{i}"));
        }

        let snapshot = Snapshot::open(write_db(&dir, &writer)).unwrap();

        for i in 0..2000 {
            let raw = snapshot.raw(&format!("/key/{i}")).unwrap().unwrap();
            assert_eq!(raw, format!("s{i}").as_bytes());
        }
        assert_eq!(snapshot.raw("/key/2000").unwrap(), None);
    }

    #[test]
    fn first_duplicate_wins() {
        let dir = TempDir::new().unwrap();
        let mut writer = CdbWriter::new();
        writer.put("/dup", "sfirst").put("/dup", "ssecond");

        let snapshot = Snapshot::open(write_db(&dir, &writer)).unwrap();

        assert_eq!(snapshot.raw("/dup").unwrap(), Some(&b"sfirst"[..]));
    }
}

mod records {
    use super::*;

    #[test]
    fn splits_type_tag_from_payload() {
        let dir = TempDir::new().unwrap();
        let mut writer = CdbWriter::new();
        writer
            .put("/text", "shello")
            .put("/json", "j[1]")
            .put("/odd", "xdata")
            .put("/empty", "s");

        let snapshot = Snapshot::open(write_db(&dir, &writer)).unwrap();

        let text = snapshot.record("/text").unwrap().unwrap();
        assert_eq!(text.format, ValueFormat::Text);
        assert_eq!(text.data, b"hello");

        let json = snapshot.record("/json").unwrap().unwrap();
        assert_eq!(json.format, ValueFormat::Json);

        let odd = snapshot.record("/odd").unwrap().unwrap();
        assert_eq!(odd.format, ValueFormat::Other(b'x'));

        let empty = snapshot.record("/empty").unwrap().unwrap();
        assert_eq!(empty.format, ValueFormat::Text);
        assert!(empty.data.is_empty());
    }

    #[test]
    fn untagged_value_is_corrupt_not_absent() {
        let dir = TempDir::new().unwrap();
        let mut writer = CdbWriter::new();
        writer.put("/broken", "");

        let snapshot = Snapshot::open(write_db(&dir, &writer)).unwrap();

        assert_eq!(snapshot.raw("/broken").unwrap(), Some(&b""[..]));
        assert!(matches!(
            snapshot.record("/broken"),
            Err(ConfError::CorruptRecord { path }) if path == "/broken"
        ));
    }

    #[test]
    fn raw_value_outlives_its_lookup() {
        let dir = TempDir::new().unwrap();
        let mut writer = CdbWriter::new();
        writer.put("/a", "svalue");
        let path = write_db(&dir, &writer);

        let snapshot = Arc::new(Snapshot::open(&path).unwrap());
        let raw = RawValue::lookup(&snapshot, "/a").unwrap().unwrap();
        drop(snapshot);

        let mut replacement = CdbWriter::new();
        replacement.put("/a", "sother");
        replacement.publish(&path).unwrap();

        assert_eq!(&*raw, b"svalue");
        assert_eq!(raw.format(), Some(ValueFormat::Text));
        assert_eq!(raw.data(), b"value");
    }
}

mod validation {
    use super::*;

    #[test]
    fn missing_file_fails_to_open() {
        let dir = TempDir::new().unwrap();

        let result = Snapshot::open(dir.path().join("absent.cdb"));

        assert!(matches!(result, Err(ConfError::Open { .. })));
    }

    #[test]
    fn short_file_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.cdb");
        fs::write(&path, vec![0u8; HEADER_SIZE - 1]).unwrap();

        assert!(matches!(Snapshot::open(&path), Err(ConfError::Open { .. })));
    }

    #[test]
    fn empty_file_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.cdb");
        fs::write(&path, b"").unwrap();

        assert!(matches!(Snapshot::open(&path), Err(ConfError::Open { .. })));
    }

    #[test]
    fn truncated_database_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let mut writer = CdbWriter::new();
        writer.put("/a", "s1").put("/b", "s2");

        let mut bytes = writer.to_bytes().unwrap();
        bytes.truncate(bytes.len() - 4);

        let path = dir.path().join("truncated.cdb");
        fs::write(&path, bytes).unwrap();

        assert!(matches!(Snapshot::open(&path), Err(ConfError::Open { .. })));
    }

    #[test]
    fn overlong_record_frame_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let mut writer = CdbWriter::new();
        writer.put("/a", "s1");

        let mut bytes = writer.to_bytes().unwrap();
        bytes[HEADER_SIZE + 4..HEADER_SIZE + 8].copy_from_slice(&1000u32.to_le_bytes());

        let path = dir.path().join("overlong.cdb");
        fs::write(&path, bytes).unwrap();

        assert!(matches!(Snapshot::open(&path), Err(ConfError::Open { .. })));
    }

    #[test]
    fn empty_database_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = write_db(&dir, &CdbWriter::new());

        let snapshot = Snapshot::open(&path).unwrap();

        assert_eq!(snapshot.raw("/anything").unwrap(), None);
        assert_eq!(snapshot.path(), path.as_path());
    }
}
