//! cdbconf - read-side client for live-reloaded CDB configuration modules.
//!
//! A publisher distributes configuration as constant databases and replaces
//! them atomically by renaming a new file over the old one. This crate maps
//! each module file into memory, serves typed values from it, reloads it
//! when the file is replaced and tells subscribers what changed.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! let module = cdbconf::open_module("TREE")?;
//!
//! let workers = module.get_int("/service/workers", 4);
//! let timeout = module.get_duration("/service/timeout", Duration::from_secs(1));
//! println!("{workers} workers, {timeout:?} timeout");
//!
//! let mut changes = module.subscribe_subtree("/service")?;
//! while changes.blocking_recv().is_some() {
//!     println!("reloaded: {}", module.get_string("/service/name", ""));
//! }
//! # Ok::<(), cdbconf::ConfError>(())
//! ```

/// Value and single-flight caches.
pub mod cache;

/// Module file resolution defaults.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// Live-reloaded modules and typed getters.
pub mod module;

/// Lexical path normalisation.
pub mod path;

/// Shared module registry.
pub mod registry;

/// Memory-mapped snapshot store.
pub mod store;

/// Change subscriptions.
pub mod subscription;

/// Logging setup for binaries.
pub mod tracing_config;

/// Filesystem watching and reload dispatch.
pub mod watcher;

#[doc(hidden)]
pub mod testing;

use std::{path::Path, sync::Arc};

/// Re-exported core types for convenience.
pub use crate::core::{ConfError, Result};
pub use config::ResolveOptions;
pub use module::{Decode, Json, Module, Subtree};
pub use registry::{ModuleKey, Registry};
pub use store::{RawValue, Snapshot, ValueFormat};

/// Opens a module through the process-wide [`Registry`].
///
/// # Errors
/// Returns `ConfError::Open` if the module file is missing or invalid.
pub fn open_module(name: impl AsRef<Path>) -> Result<Arc<Module>> {
    Registry::global().open(name)
}

/// Opens a module through the process-wide [`Registry`] and returns its
/// subtree under `prefix`.
///
/// # Errors
/// Returns `ConfError::Open` if the module file is missing or invalid.
pub fn open_subtree(name: impl AsRef<Path>, prefix: &str) -> Result<Subtree> {
    Registry::global().open_subtree(name, prefix)
}
