//! Volatile store keeping collision chains in memory.

use std::collections::HashMap;

use super::{Cursor, PersistentStore};
use crate::error::Result;

/// In-memory [`PersistentStore`].
///
/// Each hash owns a chain of slots. Removal leaves a tombstone in place so
/// live cursors keep pointing at the right chain position; [`tick`]
/// squeezes the tombstones out.
///
/// [`tick`]: PersistentStore::tick
#[derive(Debug, Default)]
pub struct MemoryStore {
    chains: HashMap<u32, Vec<Option<Box<[u8]>>>>,
    live: usize,
    tombstones: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub(crate) fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Inserts into the first free slot of the chain and reports which.
    pub(crate) fn insert_slot(&mut self, hash: u32, record: &[u8]) -> usize {
        let chain = self.chains.entry(hash).or_default();
        let slot = match chain.iter().position(Option::is_none) {
            Some(i) => {
                chain[i] = Some(record.into());
                self.tombstones -= 1;
                i
            }
            None => {
                chain.push(Some(record.into()));
                chain.len() - 1
            }
        };
        self.live += 1;
        slot
    }

    pub(crate) fn remove_slot(&mut self, hash: u32, slot: usize) -> bool {
        let taken = self
            .chains
            .get_mut(&hash)
            .and_then(|chain| chain.get_mut(slot))
            .and_then(Option::take);
        if taken.is_some() {
            self.live -= 1;
            self.tombstones += 1;
        }
        taken.is_some()
    }

    /// Drops tombstones; slot numbers of surviving records shift down.
    pub(crate) fn compact(&mut self) {
        self.chains.retain(|_, chain| {
            chain.retain(Option::is_some);
            !chain.is_empty()
        });
        self.tombstones = 0;
    }

    /// Every live record, chain order preserved within each hash.
    pub(crate) fn records(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.chains.iter().flat_map(|(hash, chain)| {
            chain
                .iter()
                .filter_map(move |slot| slot.as_deref().map(|rec| (*hash, rec)))
        })
    }

    fn scan(&self, hash: u32, from: usize) -> Option<Cursor> {
        let chain = self.chains.get(&hash)?;
        (from..chain.len())
            .find(|&i| chain[i].is_some())
            .map(|slot| Cursor { hash, slot })
    }
}

impl PersistentStore for MemoryStore {
    fn insert(&mut self, hash: u32, record: &[u8]) -> Result<()> {
        self.insert_slot(hash, record);
        Ok(())
    }

    fn remove(&mut self, cursor: Cursor) -> Result<()> {
        self.remove_slot(cursor.hash, cursor.slot);
        Ok(())
    }

    fn copy(&self, cursor: Cursor) -> Option<Vec<u8>> {
        self.chains
            .get(&cursor.hash)?
            .get(cursor.slot)?
            .as_deref()
            .map(<[u8]>::to_vec)
    }

    fn find_first_key(&self, hash: u32) -> Option<Cursor> {
        self.scan(hash, 0)
    }

    fn find_next_key(&self, cursor: Cursor, hash: u32) -> Option<Cursor> {
        if cursor.hash != hash {
            return None;
        }
        self.scan(hash, cursor.slot + 1)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        if self.tombstones > 0 {
            self.compact();
        }
        Ok(())
    }

    fn close_all(&mut self) -> Result<()> {
        Ok(())
    }
}
