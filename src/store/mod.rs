//! Persistent Store Module
//!
//! The keyed, hash-addressed record store sitting behind the attribute
//! cache, and two implementations of it.
//!
//! Records are filed under a 32-bit hash chosen by the caller. The store
//! only knows hashes: walking a collision chain with [`find_first_key`]
//! and [`find_next_key`] yields every record filed under that hash, and it
//! is up to the caller to pick out the one whose key it wants.
//!
//! A cursor stays valid across [`remove`] of the record it points at, so a
//! caller can purge matches while walking a chain.
//!
//! [`find_first_key`]: PersistentStore::find_first_key
//! [`find_next_key`]: PersistentStore::find_next_key
//! [`remove`]: PersistentStore::remove

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;

use crate::error::Result;

// == Cursor ==
/// Position of one record within a collision chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub(crate) hash: u32,
    pub(crate) slot: usize,
}

// == Persistent Store ==
/// Contract between the caches and durable storage.
pub trait PersistentStore: fmt::Debug + Send + Sync {
    /// Files `record` under `hash`.
    fn insert(&mut self, hash: u32, record: &[u8]) -> Result<()>;

    /// Drops the record at `cursor`. The cursor may still be passed to
    /// [`find_next_key`](PersistentStore::find_next_key).
    fn remove(&mut self, cursor: Cursor) -> Result<()>;

    /// Copies out the record at `cursor`.
    fn copy(&self, cursor: Cursor) -> Option<Vec<u8>>;

    /// First record filed under `hash`.
    fn find_first_key(&self, hash: u32) -> Option<Cursor>;

    /// Next record filed under `hash` after `cursor`.
    fn find_next_key(&self, cursor: Cursor, hash: u32) -> Option<Cursor>;

    /// Makes every prior mutation durable.
    fn sync(&mut self) -> Result<()>;

    /// Periodic housekeeping; expected to be cheap.
    fn tick(&mut self) -> Result<()>;

    /// Flushes and releases backing resources.
    fn close_all(&mut self) -> Result<()>;
}

/// Boxed store as held by the attribute cache.
pub type BoxStore = Box<dyn PersistentStore>;
