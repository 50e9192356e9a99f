//! Caches: decoded values per snapshot, and single-flight construction.

mod sync_cache;
mod value_cache;

#[cfg(test)]
mod tests;

pub use sync_cache::{Load, LoadGuard, SyncCache};
pub use value_cache::ValueCache;
