//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use cdbconf::{
    Module, Registry, ResolveOptions,
    testing::{CdbWriter, text_tree},
    watcher::NoWatch,
};
use tempfile::TempDir;

/// A scratch module directory.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Atomically publishes `writer` as `<name>.cdb`.
    pub fn publish(&self, name: &str, writer: &CdbWriter) -> PathBuf {
        let path = self.path(&format!("{name}.cdb"));
        writer.publish(&path).unwrap();
        path
    }

    /// Publishes plain-text parameters with child lists as `<name>.cdb`.
    pub fn tree<'a>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> PathBuf {
        self.publish(name, &text_tree(params))
    }

    /// Atomically replaces `<name>.cdb` with arbitrary bytes.
    pub fn publish_bytes(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path(&format!("{name}.cdb"));
        let tmp = self.path(&format!("{name}.cdb.tmp"));
        fs::write(&tmp, bytes).unwrap();
        fs::rename(&tmp, &path).unwrap();
        path
    }

    pub fn options(&self) -> ResolveOptions {
        ResolveOptions::default()
            .with_dir(self.dir.path())
            .with_extension("cdb")
    }

    /// A registry resolving names in this directory without reloads.
    pub fn registry(&self) -> Registry {
        Registry::with_dir_watch(self.options(), NoWatch)
    }

    /// Opens `<name>.cdb` directly, outside any registry.
    pub fn module(&self, name: &str) -> Arc<Module> {
        Arc::new(Module::open(self.path(&format!("{name}.cdb"))).unwrap())
    }
}

pub fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap()
}
