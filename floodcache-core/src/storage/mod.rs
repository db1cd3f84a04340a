//! Storage modules for Floodcache
//!
//! Provides the in-memory master/replica tables and the on-disk file bytes.

pub mod entry_store;
pub mod file_store;

pub use entry_store::{CachedFileRecord, EntryStore};
pub use file_store::{
    FileLocation, FileStore, LocalInventory, MODIFICATION_MARKER, validate_filename,
};
