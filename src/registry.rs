//! Module resolution: one shared [`Module`] per backing file.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use tracing::debug;

use crate::{
    cache::{Load, SyncCache},
    config::ResolveOptions,
    core::{ConfError, Result},
    module::{Module, Subtree},
    watcher::{DirWatch, ReloadWatcher},
};

/// Key in the module resolution cache.
///
/// A module is cached under the path it was requested by and under its
/// canonical file path, so differently spelled requests for the same file
/// share one module and the watcher can find it by event path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleKey {
    /// Resolved but not canonicalized request path
    Requested(PathBuf),
    /// Canonical path of the backing file
    File(PathBuf),
}

/// Opens modules at most once per file and keeps them reloading.
pub struct Registry {
    options: ResolveOptions,
    modules: Arc<SyncCache<ModuleKey, Arc<Module>>>,
    watch: Box<dyn DirWatch>,
}

impl Registry {
    /// Creates a registry with its own, lazily started reload watcher.
    pub fn new(options: ResolveOptions) -> Self {
        let modules = Arc::new(SyncCache::new());
        let watch = ReloadWatcher::new(Arc::clone(&modules));

        Self {
            options,
            modules,
            watch: Box::new(watch),
        }
    }

    /// Creates a registry that registers directories with `watch` instead
    /// of a reload watcher.
    pub fn with_dir_watch(options: ResolveOptions, watch: impl DirWatch + 'static) -> Self {
        Self {
            options,
            modules: Arc::new(SyncCache::new()),
            watch: Box::new(watch),
        }
    }

    /// The process-wide registry, created with default options on first use.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(|| Registry::new(ResolveOptions::default()))
    }

    /// Default resolution options of this registry.
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Opens the module `name` with this registry's options.
    ///
    /// # Errors
    /// Returns `ConfError::Open` if the file is missing or invalid and
    /// `ConfError::Watch` if its directory cannot be watched.
    pub fn open(&self, name: impl AsRef<Path>) -> Result<Arc<Module>> {
        self.open_with(name, &self.options)
    }

    /// Opens the module `name`, resolving it with `options`.
    ///
    /// Concurrent first opens of the same module load it once; every caller
    /// gets the same instance. A failed open is not cached.
    ///
    /// # Errors
    /// Returns `ConfError::Open` if the file is missing or invalid and
    /// `ConfError::Watch` if its directory cannot be watched.
    pub fn open_with(&self, name: impl AsRef<Path>, options: &ResolveOptions) -> Result<Arc<Module>> {
        let requested = options.resolve(name);

        let guard = match self.modules.load(ModuleKey::Requested(requested.clone())) {
            Load::Ready(module) => return Ok(module),
            Load::Vacant(guard) => guard,
        };

        let file = requested
            .canonicalize()
            .map_err(|err| ConfError::open(&requested, err))?;

        let module = match self.modules.load(ModuleKey::File(file.clone())) {
            Load::Ready(module) => module,
            Load::Vacant(file_guard) => {
                let module = Arc::new(Module::open(&file)?);

                if let Some(dir) = file.parent() {
                    self.watch.watch_dir(dir)?;
                }

                file_guard.store(Arc::clone(&module));
                module
            }
        };

        debug!(requested = %requested.display(), file = %file.display(), "Module resolved");
        guard.store(Arc::clone(&module));

        Ok(module)
    }

    /// Opens the module `name` and returns its subtree under `prefix`.
    ///
    /// # Errors
    /// Same as [`Registry::open`].
    pub fn open_subtree(&self, name: impl AsRef<Path>, prefix: &str) -> Result<Subtree> {
        Ok(self.open(name)?.subtree(prefix))
    }

    /// The loaded module backed by the canonical path `file`, if any.
    pub fn module_for_file(&self, file: &Path) -> Option<Arc<Module>> {
        self.modules.load_only(&ModuleKey::File(file.to_path_buf()))
    }

    /// Stops reload dispatch; loaded modules keep their current snapshot.
    pub fn shutdown(&self) {
        self.watch.shutdown();
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("options", &self.options)
            .field("modules", &self.modules.len())
            .finish_non_exhaustive()
    }
}
