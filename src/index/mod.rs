//! Keyed Index Module
//!
//! A hash-bucketed directory mapping variable-length byte keys to values.
//!
//! The index never interprets keys. Records are grouped by a 32-bit hash
//! of the key bytes; many distinct keys can share one hash, so every
//! lookup re-checks full key equality on each same-hash candidate.

use crc32fast::Hasher;

/// Initial number of buckets (2^4).
const INITIAL_POWER: u32 = 4;

/// Average chain length that triggers a directory doubling.
const MAX_LOAD: usize = 2;

// == Hashing ==
/// Hashes a key the way every index and store in the engine does.
pub fn hash_bytes(key: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(key);
    hasher.finalize()
}

// == Index Info ==
/// Shape of an index's bucket directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexInfo {
    pub entries: usize,
    pub buckets: usize,
    pub empty_buckets: usize,
    pub longest_chain: usize,
}

// == Slot ==
#[derive(Debug, Clone)]
struct Slot<V> {
    hash: u32,
    key: Box<[u8]>,
    value: V,
}

// == Keyed Index ==
/// Hash-bucketed directory of `(key bytes, value)` pairs.
#[derive(Debug, Clone)]
pub struct KeyedIndex<V> {
    buckets: Vec<Vec<Slot<V>>>,
    mask: usize,
    len: usize,
}

impl<V> Default for KeyedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyedIndex<V> {
    // == Constructor ==
    /// Creates an empty index.
    pub fn new() -> Self {
        let n = 1usize << INITIAL_POWER;
        Self {
            buckets: (0..n).map(|_| Vec::new()).collect(),
            mask: n - 1,
            len: 0,
        }
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize & self.mask
    }

    fn position(&self, hash: u32, key: &[u8]) -> Option<(usize, usize)> {
        let b = self.bucket_of(hash);
        self.buckets[b]
            .iter()
            .position(|slot| slot.hash == hash && &*slot.key == key)
            .map(|i| (b, i))
    }

    // == Insert ==
    /// Adds a `(key, value)` pair and hands back the stored value.
    ///
    /// The key must not already be present; callers check with [`find`]
    /// first or use [`get_or_insert_with`].
    ///
    /// [`find`]: KeyedIndex::find
    /// [`get_or_insert_with`]: KeyedIndex::get_or_insert_with
    pub fn insert(&mut self, key: &[u8], value: V) -> &mut V {
        let hash = hash_bytes(key);
        debug_assert!(self.position(hash, key).is_none(), "duplicate key");
        self.insert_hashed(hash, key, value)
    }

    /// Returns the value under `key`, creating it with `make` when absent.
    pub fn get_or_insert_with(&mut self, key: &[u8], make: impl FnOnce() -> V) -> &mut V {
        let hash = hash_bytes(key);
        match self.position(hash, key) {
            Some((b, i)) => &mut self.buckets[b][i].value,
            None => self.insert_hashed(hash, key, make()),
        }
    }

    fn insert_hashed(&mut self, hash: u32, key: &[u8], value: V) -> &mut V {
        if self.len >= self.buckets.len() * MAX_LOAD {
            self.grow();
        }
        let b = self.bucket_of(hash);
        let bucket = &mut self.buckets[b];
        bucket.push(Slot {
            hash,
            key: key.into(),
            value,
        });
        self.len += 1;
        let i = bucket.len() - 1;
        &mut bucket[i].value
    }

    // == Find ==
    /// Returns the value stored under `key`.
    pub fn find(&self, key: &[u8]) -> Option<&V> {
        let (b, i) = self.position(hash_bytes(key), key)?;
        Some(&self.buckets[b][i].value)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn find_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let (b, i) = self.position(hash_bytes(key), key)?;
        Some(&mut self.buckets[b][i].value)
    }

    // == Remove ==
    /// Removes `key`, handing back its value.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let (b, i) = self.position(hash_bytes(key), key)?;
        self.len -= 1;
        Some(self.buckets[b].swap_remove(i).value)
    }

    // == Replace ==
    /// Swaps the value stored under `key`, returning the old one.
    ///
    /// Returns `None` (and drops `value`) when the key is absent.
    pub fn replace(&mut self, key: &[u8], value: V) -> Option<V> {
        self.find_mut(key).map(|slot| std::mem::replace(slot, value))
    }

    /// Swaps every value equal to `old` for a clone of `new`.
    /// Returns how many were replaced.
    pub fn replace_all(&mut self, old: &V, new: V) -> usize
    where
        V: PartialEq + Clone,
    {
        let mut replaced = 0;
        for slot in self.buckets.iter_mut().flatten() {
            if slot.value == *old {
                slot.value = new.clone();
                replaced += 1;
            }
        }
        replaced
    }

    // == Enumeration ==
    /// Walks every record regardless of hash.
    ///
    /// Each call starts a fresh walk. The borrow rules out mutation while
    /// a walk is in progress.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &V)> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter())
            .map(|slot| (&*slot.key, &slot.value))
    }

    /// Walks only the records whose key hashes to `hash`.
    ///
    /// Same-hash does not mean same key; callers compare keys themselves.
    /// No order is guaranteed among the yielded records.
    pub fn iter_hash(&self, hash: u32) -> impl Iterator<Item = (&[u8], &V)> {
        self.buckets[self.bucket_of(hash)]
            .iter()
            .filter(move |slot| slot.hash == hash)
            .map(|slot| (&*slot.key, &slot.value))
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn info(&self) -> IndexInfo {
        IndexInfo {
            entries: self.len,
            buckets: self.buckets.len(),
            empty_buckets: self.buckets.iter().filter(|b| b.is_empty()).count(),
            longest_chain: self.buckets.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    /// Drops every record and shrinks back to the initial directory.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    fn grow(&mut self) {
        let n = self.buckets.len() * 2;
        let mut buckets: Vec<Vec<Slot<V>>> = (0..n).map(|_| Vec::new()).collect();
        let mask = n - 1;
        for slot in self.buckets.drain(..).flatten() {
            buckets[slot.hash as usize & mask].push(slot);
        }
        self.buckets = buckets;
        self.mask = mask;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_new() {
        let index: KeyedIndex<u32> = KeyedIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.iter().count(), 0);
    }

    #[test]
    fn test_insert_and_find() {
        let mut index = KeyedIndex::new();
        index.insert(b"alpha", 1);
        index.insert(b"beta", 2);

        assert_eq!(index.find(b"alpha"), Some(&1));
        assert_eq!(index.find(b"beta"), Some(&2));
        assert_eq!(index.find(b"gamma"), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut index = KeyedIndex::new();
        *index.get_or_insert_with(b"alpha", || 1) += 10;
        let v = index.get_or_insert_with(b"alpha", || panic!("already present"));
        assert_eq!(*v, 11);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut index = KeyedIndex::new();
        index.insert(b"alpha", 1);
        index.insert(b"beta", 2);

        assert_eq!(index.remove(b"alpha"), Some(1));
        assert_eq!(index.remove(b"alpha"), None);
        assert_eq!(index.find(b"alpha"), None);
        assert_eq!(index.find(b"beta"), Some(&2));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_replace() {
        let mut index = KeyedIndex::new();
        index.insert(b"alpha", 1);

        assert_eq!(index.replace(b"alpha", 10), Some(1));
        assert_eq!(index.find(b"alpha"), Some(&10));
        assert_eq!(index.replace(b"missing", 5), None);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_iter_visits_everything_across_growth() {
        let mut index = KeyedIndex::new();
        for i in 0u32..500 {
            index.insert(&i.to_le_bytes(), i);
        }
        assert_eq!(index.len(), 500);

        let mut seen: Vec<u32> = index.iter().map(|(_, v)| *v).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());

        for i in 0u32..500 {
            assert_eq!(index.find(&i.to_le_bytes()), Some(&i));
        }
    }

    #[test]
    fn test_iter_hash_only_yields_same_hash() {
        let mut index = KeyedIndex::new();
        for i in 0u32..100 {
            index.insert(&i.to_le_bytes(), i);
        }
        let key = 42u32.to_le_bytes();
        let hash = hash_bytes(&key);

        let chain: Vec<_> = index.iter_hash(hash).collect();
        assert!(!chain.is_empty());
        assert!(chain.iter().all(|(k, _)| hash_bytes(k) == hash));
        assert!(chain.iter().any(|(k, v)| *k == key && **v == 42));
    }

    #[test]
    fn test_clear() {
        let mut index = KeyedIndex::new();
        index.insert(b"alpha", 1);
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.find(b"alpha"), None);
    }

    #[test]
    fn test_replace_all() {
        let mut index = KeyedIndex::new();
        index.insert(b"alpha", 1);
        index.insert(b"beta", 2);
        index.insert(b"gamma", 1);

        assert_eq!(index.replace_all(&1, 7), 2);
        assert_eq!(index.find(b"alpha"), Some(&7));
        assert_eq!(index.find(b"beta"), Some(&2));
        assert_eq!(index.find(b"gamma"), Some(&7));
        assert_eq!(index.replace_all(&1, 9), 0);
    }

    #[test]
    fn test_info_tracks_growth() {
        let mut index = KeyedIndex::new();
        let empty = index.info();
        assert_eq!(empty.entries, 0);
        assert_eq!(empty.buckets, 16);
        assert_eq!(empty.empty_buckets, 16);
        assert_eq!(empty.longest_chain, 0);

        for i in 0u32..100 {
            index.insert(&i.to_le_bytes(), i);
        }
        let info = index.info();
        assert_eq!(info.entries, 100);
        assert!(info.buckets >= 50);
        assert!(info.longest_chain >= 1);
        assert!(info.empty_buckets < info.buckets);
    }

    #[test]
    fn test_colliding_keys_are_told_apart() {
        let (a, b) = crate::cache::colliding_keys();
        let (a, b) = (a.to_bytes(), b.to_bytes());
        let hash = hash_bytes(&a);
        assert_eq!(hash_bytes(&b), hash);

        let mut index = KeyedIndex::new();
        index.insert(&a, "a");
        assert_eq!(index.find(&b), None);
        index.insert(&b, "b");

        assert_eq!(index.find(&a), Some(&"a"));
        assert_eq!(index.find(&b), Some(&"b"));
        assert_eq!(index.iter_hash(hash).count(), 2);

        assert_eq!(index.replace(&b, "b2"), Some("b"));
        assert_eq!(index.find(&a), Some(&"a"));

        assert_eq!(index.remove(&a), Some("a"));
        assert_eq!(index.find(&a), None);
        assert_eq!(index.find(&b), Some(&"b2"));
        let chain: Vec<_> = index.iter_hash(hash).collect();
        assert_eq!(chain, vec![(&b[..], &"b2")]);
    }
}
