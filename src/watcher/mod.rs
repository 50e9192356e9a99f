//! Reload dispatch driven by filesystem events.
//!
//! Publishers replace a database by writing a new file and renaming it over
//! the old one. Watching the containing directory for created entries
//! catches exactly that, so directories (not files) are registered.

mod file_watcher;
mod reload;

use std::path::Path;

pub use file_watcher::{FileEvent, FileEventKind, FileWatcher};
pub use reload::ReloadWatcher;

use crate::core::Result;

/// Registers directories whose files should trigger reloads.
pub trait DirWatch: Send + Sync {
    /// Starts watching `dir`; registering the same directory again is a no-op.
    ///
    /// # Errors
    /// Returns `ConfError::Watch` if the directory cannot be watched.
    fn watch_dir(&self, dir: &Path) -> Result<()>;

    /// Stops dispatching reloads. Loaded modules keep their last snapshot.
    fn shutdown(&self) {}
}

/// A [`DirWatch`] that never reloads anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWatch;

impl DirWatch for NoWatch {
    fn watch_dir(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}
