//! Immutable snapshot store.
//!
//! A snapshot is a memory-mapped constant database (cdb): byte-string keys
//! mapped to byte-string values, where every value starts with a one-byte
//! type tag. Lookups are zero-copy and need no locking.

pub(crate) mod cdb;
mod snapshot;

#[cfg(test)]
mod tests;

pub use snapshot::{RawValue, Record, Snapshot, ValueFormat};
