//! Cache Entry Module
//!
//! Defines the structure for individual attribute-cache entries.

use crate::cache::AttrKey;

/// Bookkeeping bytes charged to every entry on top of its payload.
///
/// Matches the size of a list node (two links, the key and a length) so
/// that negative entries still weigh something against the bound.
pub const ENTRY_HEADER_SIZE: usize = 32;

// == Cache Entry ==
/// One cached attribute value, or a record that the store has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: AttrKey,
    /// Empty for a negative entry
    pub value: Box<[u8]>,
}

impl CacheEntry {
    pub fn new(key: AttrKey, value: &[u8]) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Entry asserting "looked up, not in the store".
    pub fn negative(key: AttrKey) -> Self {
        Self::new(key, &[])
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_empty()
    }

    /// Bytes this entry counts against the aggregate bound.
    pub fn footprint(&self) -> usize {
        ENTRY_HEADER_SIZE + self.value.len()
    }
}
