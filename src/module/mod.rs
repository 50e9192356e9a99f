//! Modules: one backing database file with live reload.
//!
//! A [`Module`] owns the current [`Snapshot`] of its file together with the
//! decoded-value cache for that snapshot and the module's subscriptions.
//! Readers share the snapshot lock; [`Module::reopen`] takes it exclusively
//! to install a replacement, so a reader sees either the old snapshot or
//! the new one in full.

mod getters;
mod parsers;
mod subtree;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::SystemTime,
};

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub use parsers::{Decode, Json, parse_duration};
pub use subtree::Subtree;

use crate::{
    cache::ValueCache,
    core::{ConfError, Result},
    path::clean_prefix,
    store::{RawValue, Snapshot},
    subscription::{Notifier, SubscriptionKey, SubscriptionRegistry},
};

struct Live {
    snapshot: Arc<Snapshot>,
    values: Arc<ValueCache>,
}

impl Live {
    fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            values: Arc::new(ValueCache::new()),
        }
    }
}

/// A live-reloaded configuration module.
///
/// Lock order is snapshot lock first, subscriptions second.
pub struct Module {
    name: String,
    file: PathBuf,
    live: RwLock<Live>,
    subscriptions: Mutex<SubscriptionRegistry>,
}

impl Module {
    /// Opens the database at `file`.
    ///
    /// Most callers go through [`Registry`](crate::Registry), which shares
    /// one module per file and reloads it when the file is replaced.
    ///
    /// # Errors
    /// Returns `ConfError::Open` if the file is missing or invalid.
    pub fn open(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let snapshot = Snapshot::open(file)?;

        let name = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(module = %name, file = %file.display(), "Module opened");

        Ok(Self {
            name,
            file: file.to_path_buf(),
            live: RwLock::new(Live::new(snapshot)),
            subscriptions: Mutex::new(SubscriptionRegistry::new()),
        })
    }

    /// Module name, taken from the file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.live().snapshot)
    }

    /// Time the current snapshot was loaded.
    pub fn opened_at(&self) -> SystemTime {
        self.live().snapshot.opened_at()
    }

    /// Replaces the current snapshot with a fresh load of the backing file.
    ///
    /// On success the decoded-value cache starts empty and every changed
    /// subscription is signalled before this returns. On failure nothing
    /// changes.
    ///
    /// # Errors
    /// Returns `ConfError::Open` if the new file cannot be loaded; the
    /// previous snapshot stays in use.
    pub fn reopen(&self) -> Result<()> {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);

        info!(module = %self.name, file = %self.file.display(), "Reloading module");

        *live = Live::new(Snapshot::open(&self.file)?);

        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions.process(&live.snapshot);

        info!(module = %self.name, "Module reloaded");
        Ok(())
    }

    /// Raw value bytes at `path`, type tag included.
    ///
    /// The returned value pins the snapshot it came from. An inconsistent
    /// index is logged and reported as absent.
    pub fn get_raw(&self, path: &str) -> Option<RawValue> {
        let snapshot = self.snapshot();

        match RawValue::lookup(&snapshot, path) {
            Ok(raw) => raw,
            Err(err) => {
                error!(module = %self.name, path, error = %err, "Lookup failed");
                None
            }
        }
    }

    /// Decodes the value at `path` as `T`, through the value cache.
    ///
    /// # Errors
    /// Returns `ConfError::NotFound` for an absent path, and the decode or
    /// record errors of `T` otherwise.
    pub fn get<T: Decode>(&self, path: &str) -> Result<T> {
        let (snapshot, values) = {
            let live = self.live();
            (Arc::clone(&live.snapshot), Arc::clone(&live.values))
        };

        if let Some(value) = values.get::<T>(path) {
            return Ok(value);
        }

        let record = snapshot
            .record(path)?
            .ok_or_else(|| ConfError::NotFound {
                path: path.to_string(),
            })?;

        let value = T::decode(path, record)?;
        values.set(path, value.clone());

        Ok(value)
    }

    /// Decodes the value at `path`, or `None` if it is absent or invalid.
    ///
    /// Failures other than absence are logged.
    pub fn get_if_exists<T: Decode>(&self, path: &str) -> Option<T> {
        match self.get(path) {
            Ok(value) => Some(value),
            Err(err) => {
                self.log_fallback(path, &err);
                None
            }
        }
    }

    /// Decodes the value at `path`, or returns `default` if it is absent or
    /// invalid.
    ///
    /// Failures other than absence are logged.
    pub fn get_or<T: Decode>(&self, path: &str, default: T) -> T {
        self.get_if_exists(path).unwrap_or(default)
    }

    /// Deserialises the JSON value at `path`.
    ///
    /// Returns `Ok(None)` if the path is absent.
    ///
    /// # Errors
    /// Returns `ConfError::FormatMismatch` for a non-JSON record and
    /// `ConfError::Decode` if the document does not match `T`.
    pub fn get_struct<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        match self.get::<Json<T>>(path) {
            Ok(Json(value)) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// A view of this module with every path prefixed by `prefix`.
    pub fn subtree(self: &Arc<Self>, prefix: &str) -> Subtree {
        Subtree::new(Arc::clone(self), clean_prefix(prefix))
    }

    /// Subscribes to changes of the value at `path`.
    ///
    /// The returned receiver gets a signal after each reload that changes
    /// the value. Signals coalesce: at most one is pending at a time.
    ///
    /// # Errors
    /// Returns an error if the current value cannot be fingerprinted.
    pub fn subscribe(&self, path: &str) -> Result<mpsc::Receiver<()>> {
        let (tx, rx) = mpsc::channel(1);
        self.subscribe_key(SubscriptionKey::new(path, false), &tx)?;
        Ok(rx)
    }

    /// Subscribes to changes of `path` and anything below it.
    ///
    /// Subscribing to the root `/` signals on every reload.
    ///
    /// # Errors
    /// Returns an error if the subtree cannot be fingerprinted.
    pub fn subscribe_subtree(&self, path: &str) -> Result<mpsc::Receiver<()>> {
        let (tx, rx) = mpsc::channel(1);
        self.subscribe_key(SubscriptionKey::new(path, true), &tx)?;
        Ok(rx)
    }

    /// Registers `channel` for changes of the value at `path`.
    ///
    /// The module keeps a clone of the sender until the subscription is
    /// removed or the receiver is dropped.
    ///
    /// # Errors
    /// Returns an error if the current value cannot be fingerprinted.
    pub fn subscribe_chan(&self, path: &str, channel: &Notifier) -> Result<()> {
        self.subscribe_key(SubscriptionKey::new(path, false), channel)
    }

    /// Registers `channel` for changes of `path` and anything below it.
    ///
    /// # Errors
    /// Returns an error if the subtree cannot be fingerprinted.
    pub fn subscribe_chan_subtree(&self, path: &str, channel: &Notifier) -> Result<()> {
        self.subscribe_key(SubscriptionKey::new(path, true), channel)
    }

    /// Removes `channel` from the value subscription for `path`.
    pub fn unsubscribe_chan(&self, path: &str, channel: &Notifier) {
        self.subscriptions()
            .unsubscribe_chan(&SubscriptionKey::new(path, false), channel);
    }

    /// Removes `channel` from the subtree subscription for `path`.
    pub fn unsubscribe_chan_subtree(&self, path: &str, channel: &Notifier) {
        self.subscriptions()
            .unsubscribe_chan(&SubscriptionKey::new(path, true), channel);
    }

    /// Removes the value subscription for `path` and all of its channels.
    pub fn unsubscribe(&self, path: &str) {
        self.subscriptions()
            .unsubscribe(&SubscriptionKey::new(path, false));
    }

    /// Removes the subtree subscription for `path` and all of its channels.
    pub fn unsubscribe_subtree(&self, path: &str) {
        self.subscriptions()
            .unsubscribe(&SubscriptionKey::new(path, true));
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions().len()
    }

    fn subscribe_key(&self, key: SubscriptionKey, channel: &Notifier) -> Result<()> {
        let live = self.live();
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        subscriptions.subscribe(key, channel, &live.snapshot)
    }

    fn live(&self) -> std::sync::RwLockReadGuard<'_, Live> {
        self.live.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscriptions(&self) -> std::sync::MutexGuard<'_, SubscriptionRegistry> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn log_fallback(&self, path: &str, err: &ConfError) {
        if !err.is_not_found() {
            warn!(module = %self.name, path, error = %err, "Falling back after lookup error");
        }
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}
