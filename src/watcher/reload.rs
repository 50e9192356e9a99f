use std::{
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    thread,
};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{DirWatch, FileEvent, FileEventKind, FileWatcher};
use crate::{
    cache::SyncCache,
    core::{ConfError, Result},
    module::Module,
    registry::ModuleKey,
};

const THREAD_NAME: &str = "cdbconf-reload";

type Modules = Arc<SyncCache<ModuleKey, Arc<Module>>>;

enum State {
    Idle,
    Running(FileWatcher),
    Stopped,
}

/// Reloads modules when their backing file is replaced.
///
/// The underlying [`FileWatcher`] and its dispatch thread start on the
/// first registered directory. Each created entry is matched against the
/// canonical file paths of loaded modules; unrelated files are ignored.
pub struct ReloadWatcher {
    modules: Modules,
    state: Mutex<State>,
}

impl ReloadWatcher {
    /// Creates an idle watcher dispatching to the modules in `modules`.
    pub fn new(modules: Modules) -> Self {
        Self {
            modules,
            state: Mutex::new(State::Idle),
        }
    }

    fn start(&self) -> Result<FileWatcher> {
        let (watcher, events) = FileWatcher::new().map_err(|err| ConfError::Watch {
            path: PathBuf::new(),
            details: err.to_string(),
        })?;

        let modules = Arc::clone(&self.modules);
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || dispatch(events, &modules))
            .map_err(|err| ConfError::Watch {
                path: PathBuf::new(),
                details: format!("cannot spawn {THREAD_NAME}: {err}"),
            })?;

        info!("Reload watcher started");
        Ok(watcher)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DirWatch for ReloadWatcher {
    fn watch_dir(&self, dir: &Path) -> Result<()> {
        let mut state = self.lock();

        if matches!(*state, State::Stopped) {
            debug!(dir = %dir.display(), "Reload watcher stopped, not watching");
            return Ok(());
        }

        if matches!(*state, State::Idle) {
            *state = State::Running(self.start()?);
        }

        if let State::Running(watcher) = &mut *state {
            watcher.watch_dir(dir).map_err(|err| ConfError::Watch {
                path: dir.to_path_buf(),
                details: err.to_string(),
            })?;

            debug!(dir = %dir.display(), "Watching directory");
        }

        Ok(())
    }

    fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.lock(), State::Stopped);

        if matches!(previous, State::Running(_)) {
            info!("Reload watcher stopped");
        }
    }
}

fn dispatch(mut events: mpsc::UnboundedReceiver<FileEvent>, modules: &Modules) {
    while let Some(event) = events.blocking_recv() {
        if event.kind != FileEventKind::Created {
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| reload(modules, &event.path)));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(path = %event.path.display(), error = %err, "Reload failed, keeping previous snapshot");
            }
            Err(_) => {
                error!(path = %event.path.display(), "Reload panicked");
            }
        }
    }

    debug!("Reload dispatch finished");
}

fn reload(modules: &Modules, path: &Path) -> Result<()> {
    let Some(module) = modules.load_only(&ModuleKey::File(path.to_path_buf())) else {
        return Ok(());
    };

    module.reopen()
}
