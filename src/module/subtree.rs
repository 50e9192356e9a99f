use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use super::{Decode, Module};
use crate::{
    core::Result,
    path::{clean_prefix, join},
    store::RawValue,
    subscription::Notifier,
};

/// Forwards a path-taking method to the module with the prefix applied.
macro_rules! prefixed {
    ($(
        $(#[$meta:meta])*
        fn $name:ident(&self, path: &str $(, $arg:ident: $arg_ty:ty)*) $(-> $ret:ty)?;
    )+) => {
        $(
            $(#[$meta])*
            pub fn $name(&self, path: &str $(, $arg: $arg_ty)*) $(-> $ret)? {
                self.module.$name(&self.path(path) $(, $arg)*)
            }
        )+
    };
}

/// All parameters of a [`Module`] below a fixed prefix.
///
/// Paths given to a subtree are appended to the prefix by plain
/// concatenation, so they must start with `/`. The prefix itself is
/// cleaned, and the root prefix is empty.
#[derive(Debug, Clone)]
pub struct Subtree {
    module: Arc<Module>,
    prefix: String,
}

impl Subtree {
    pub(super) fn new(module: Arc<Module>, prefix: String) -> Self {
        Self { module, prefix }
    }

    /// The underlying module.
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// The cleaned prefix; empty for the root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full module path for `path`.
    pub fn path(&self, path: &str) -> String {
        format!("{}{path}", self.prefix)
    }

    /// A nested subtree; `prefix` is joined onto this subtree's prefix.
    pub fn subtree(&self, prefix: &str) -> Subtree {
        Subtree::new(
            Arc::clone(&self.module),
            clean_prefix(&join(&self.prefix, prefix)),
        )
    }

    /// See [`Module::get`].
    ///
    /// # Errors
    /// Same as [`Module::get`].
    pub fn get<T: Decode>(&self, path: &str) -> Result<T> {
        self.module.get(&self.path(path))
    }

    /// See [`Module::get_if_exists`].
    pub fn get_if_exists<T: Decode>(&self, path: &str) -> Option<T> {
        self.module.get_if_exists(&self.path(path))
    }

    /// See [`Module::get_or`].
    pub fn get_or<T: Decode>(&self, path: &str, default: T) -> T {
        self.module.get_or(&self.path(path), default)
    }

    /// See [`Module::get_struct`].
    ///
    /// # Errors
    /// Same as [`Module::get_struct`].
    pub fn get_struct<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.module.get_struct(&self.path(path))
    }

    prefixed! {
        /// See [`Module::get_raw`].
        fn get_raw(&self, path: &str) -> Option<RawValue>;

        /// See [`Module::subscribe`].
        ///
        /// # Errors
        /// Same as [`Module::subscribe`].
        fn subscribe(&self, path: &str) -> Result<mpsc::Receiver<()>>;

        /// See [`Module::subscribe_subtree`].
        ///
        /// # Errors
        /// Same as [`Module::subscribe_subtree`].
        fn subscribe_subtree(&self, path: &str) -> Result<mpsc::Receiver<()>>;

        /// See [`Module::subscribe_chan`].
        ///
        /// # Errors
        /// Same as [`Module::subscribe_chan`].
        fn subscribe_chan(&self, path: &str, channel: &Notifier) -> Result<()>;

        /// See [`Module::subscribe_chan_subtree`].
        ///
        /// # Errors
        /// Same as [`Module::subscribe_chan_subtree`].
        fn subscribe_chan_subtree(&self, path: &str, channel: &Notifier) -> Result<()>;

        /// See [`Module::unsubscribe_chan`].
        fn unsubscribe_chan(&self, path: &str, channel: &Notifier);

        /// See [`Module::unsubscribe_chan_subtree`].
        fn unsubscribe_chan_subtree(&self, path: &str, channel: &Notifier);

        /// See [`Module::unsubscribe`].
        fn unsubscribe(&self, path: &str);

        /// See [`Module::unsubscribe_subtree`].
        fn unsubscribe_subtree(&self, path: &str);
    }
}
