//! Module file resolution defaults.
//!
//! A module is named either by a bare name (`TREE`), which is looked up in
//! the configured directory with the default extension, or by a path.

mod paths;

use std::path::{Path, PathBuf};

pub use paths::{ConfigPaths, DEFAULT_DIR, DEFAULT_EXTENSION, DIR_ENV, EXTENSION_ENV};

/// How module names map to files.
///
/// `Default` reads the environment through [`ConfigPaths`]; the builder
/// methods override either value for one registry or one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Directory relative names are joined onto
    pub dir: PathBuf,
    /// Extension appended to names without one, without a leading dot
    pub extension: String,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            dir: ConfigPaths::module_dir(),
            extension: ConfigPaths::module_extension(),
        }
    }
}

impl ResolveOptions {
    /// Replaces the base directory.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Replaces the default extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Maps a module name or path to the file it names, without touching the
    /// filesystem.
    ///
    /// The default extension is added when `name` has none, and relative
    /// names are joined onto [`dir`](Self::dir).
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();

        let mut file = if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.dir.join(name)
        };

        if file.extension().is_none() && !self.extension.is_empty() {
            file.set_extension(&self.extension);
        }

        file
    }
}
