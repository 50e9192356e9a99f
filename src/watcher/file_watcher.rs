use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
    recommended_watcher,
};
use tokio::sync::mpsc;

/// Represents a file system event inside a watched directory.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The path of the entry that changed
    pub path: PathBuf,
    /// The type of change that occurred
    pub kind: FileEventKind,
}

/// The type of file system change that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// Entry was created, or another entry was renamed onto it
    Created,
    /// Entry contents or metadata changed
    Modified,
    /// Entry was removed or renamed away
    Removed,
}

impl FileEventKind {
    fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileEventKind::Created),
            // inotify reports a rename as To plus Both; only To counts.
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => {
                Some(FileEventKind::Created)
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(FileEventKind::Removed),
            EventKind::Modify(_) => Some(FileEventKind::Modified),
            EventKind::Remove(_) => Some(FileEventKind::Removed),
            _ => None,
        }
    }
}

/// Directory watcher forwarding notify events into a Tokio channel.
///
/// Dropping the watcher closes the event channel once buffered events have
/// been received.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    watched_dirs: HashSet<PathBuf>,
}

impl FileWatcher {
    /// Creates a new watcher and returns it with its event receiver.
    ///
    /// Uses an unbounded channel since file events are typically infrequent
    /// but bursty.
    ///
    /// # Errors
    /// Returns error if the underlying file system watcher cannot be initialized.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>), notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };

            let Some(kind) = FileEventKind::from_notify(&event.kind) else {
                return;
            };

            for path in event.paths {
                let _ = event_tx.send(FileEvent { path, kind });
            }
        })?;

        Ok((
            Self {
                watcher,
                watched_dirs: HashSet::new(),
            },
            event_rx,
        ))
    }

    /// Adds a directory to the watch list.
    ///
    /// Directories are canonicalized so event paths match canonical file
    /// paths. Watching an already watched directory is a no-op.
    ///
    /// # Errors
    /// Returns error if the path cannot be canonicalized or the watcher fails to monitor it.
    pub fn watch_dir(&mut self, dir: impl AsRef<Path>) -> Result<(), notify::Error> {
        let canonical = dir.as_ref().canonicalize()?;

        if self.watched_dirs.contains(&canonical) {
            return Ok(());
        }

        self.watcher
            .watch(&canonical, RecursiveMode::NonRecursive)?;
        self.watched_dirs.insert(canonical);

        Ok(())
    }
}
