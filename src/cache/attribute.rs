//! Attribute Cache Module
//!
//! LRU-bounded cache of attribute values over a persistent keyed store.
//!
//! Lookups go to the in-memory index first, then fall through to the
//! store's collision chain for the key's hash. Misses are remembered as
//! negative entries. Every mutating call ends with a trim that evicts from
//! the cold end of the recency list until the aggregate footprint is back
//! under the configured bound.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::cache::{
    clamp_payload, decode_record, encode_record, AttrKey, CacheEntry, CacheStats, Handle, LruList,
    SpoolSet,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::index::KeyedIndex;
use crate::store::BoxStore;

// == Cache Mode ==
/// Write discipline currently in force.
#[derive(Debug, Default)]
pub enum CacheMode {
    /// Reads and writes go through the cache to the store
    #[default]
    Normal,
    /// Writes are spooled for a later replay
    Redirecting(SpoolSet),
    /// Writes are refused; another process may be reading the store
    WriteProtected,
}

impl CacheMode {
    pub fn name(&self) -> &'static str {
        match self {
            CacheMode::Normal => "normal",
            CacheMode::Redirecting(_) => "redirecting",
            CacheMode::WriteProtected => "write_protected",
        }
    }
}

// == Attribute Cache ==
/// The attribute cache and the store it fronts.
#[derive(Debug)]
pub struct AttributeCache {
    store: BoxStore,
    index: KeyedIndex<Handle>,
    lru: LruList<CacheEntry>,
    footprint: usize,
    max_footprint: usize,
    max_record_len: usize,
    spool_dir: PathBuf,
    spool_partitions: usize,
    /// Skip the in-memory layer entirely
    standalone: bool,
    mode: CacheMode,
    stats: CacheStats,
    opened_at: DateTime<Utc>,
}

impl AttributeCache {
    // == Constructor ==
    /// Puts a cache in front of an already opened store.
    pub fn open(store: BoxStore, config: &Config) -> Self {
        info!(
            "Attribute cache opened: max_cache_size={}, max_record_len={}, standalone={}",
            config.max_cache_size, config.max_record_len, config.standalone
        );
        Self {
            store,
            index: KeyedIndex::new(),
            lru: LruList::new(),
            footprint: 0,
            max_footprint: config.max_cache_size,
            max_record_len: config.max_record_len.max(1),
            spool_dir: config.spool_dir.clone(),
            spool_partitions: crate::config::normalize_partitions(config.spool_partitions),
            standalone: config.standalone,
            mode: CacheMode::Normal,
            stats: CacheStats::new(),
            opened_at: Utc::now(),
        }
    }

    // == Get ==
    /// Looks up an attribute value.
    ///
    /// Returns `None` both for a cached negative entry and for a key the
    /// store does not hold; in the latter case a negative entry is cached.
    pub fn get(&mut self, key: AttrKey) -> Option<Vec<u8>> {
        if !self.standalone {
            if let Some(&handle) = self.index.find(&key.to_bytes()) {
                self.lru.touch(handle);
                if let Some(entry) = self.lru.get(handle) {
                    if entry.is_negative() {
                        self.stats.record_negative_hit();
                        return None;
                    }
                    self.stats.record_hit();
                    return Some(entry.value.to_vec());
                }
            }
        }

        let found = self.read_store(key);
        self.stats.record_miss(found.is_some());

        if !self.standalone {
            let entry = match &found {
                Some(value) => CacheEntry::new(key, value),
                None => CacheEntry::negative(key),
            };
            self.admit(entry);
            self.trim();
        }
        found
    }

    // == Put ==
    /// Stores an attribute value.
    ///
    /// Payloads longer than the record limit are cut at the last whole
    /// UTF-8 sequence that fits. While redirected, the write is spooled and
    /// neither the cache nor the store is touched.
    pub fn put(&mut self, key: AttrKey, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(CacheError::InvalidRequest(format!(
                "empty value for attribute {}",
                key
            )));
        }
        if matches!(self.mode, CacheMode::WriteProtected) {
            warn!(
                "put({}, {:?}, {}) while database is write-protected",
                key,
                String::from_utf8_lossy(value),
                value.len()
            );
            return Err(CacheError::WriteRejected(key.to_string()));
        }

        let value = clamp_payload(value, self.max_record_len);
        if value.is_empty() {
            return Err(CacheError::InvalidRequest(format!(
                "value for attribute {} does not fit in {} bytes",
                key, self.max_record_len
            )));
        }

        if let CacheMode::Redirecting(spool) = &mut self.mode {
            return spool.append(&key, value);
        }

        self.purge_store(key)?;
        if let Err(e) = self.store.insert(key.store_hash(), &encode_record(&key, value)) {
            error!(
                "put({}, {:?}, {}) failed: {}",
                key,
                String::from_utf8_lossy(value),
                value.len(),
                e
            );
            // The store no longer holds any value for the key.
            self.evict(key);
            return Err(CacheError::StoreInsert(format!("{}: {}", key, e)));
        }

        if !self.standalone {
            self.evict(key);
            self.admit(CacheEntry::new(key, value));
            self.trim();
        }
        Ok(())
    }

    // == Delete ==
    /// Removes an attribute from the store and the cache.
    ///
    /// No negative entry is left behind; the next `get` rediscovers the
    /// absence itself.
    pub fn del(&mut self, key: AttrKey) -> Result<()> {
        if matches!(self.mode, CacheMode::WriteProtected) {
            warn!("del({}) while database is write-protected", key);
            return Err(CacheError::WriteRejected(key.to_string()));
        }
        self.purge_store(key)?;
        if !self.standalone {
            self.evict(key);
        }
        Ok(())
    }

    // == Trim ==
    /// Evicts least recently used entries until the footprint fits.
    pub fn trim(&mut self) {
        while self.footprint > self.max_footprint {
            match self.lru.evict_oldest() {
                Some(entry) => {
                    self.index.remove(&entry.key.to_bytes());
                    self.footprint = self.footprint.saturating_sub(entry.footprint());
                    self.stats.record_eviction();
                    debug!("Evicted attribute {}", entry.key);
                }
                None => {
                    warn!(
                        "Cache list empty with footprint {}; resetting to zero",
                        self.footprint
                    );
                    self.footprint = 0;
                }
            }
        }
    }

    // == Store Lifecycle ==
    /// Makes all store writes durable.
    pub fn sync(&mut self) -> Result<()> {
        self.store.sync()
    }

    /// Store housekeeping; call regularly.
    pub fn tick(&mut self) -> Result<()> {
        self.store.tick()
    }

    /// Drops every cached entry and closes the store.
    pub fn close(mut self) -> Result<()> {
        self.cleanup();
        debug!("Closing attribute cache: index {:?}", self.index.info());
        self.index.clear();
        self.lru = LruList::new();
        self.footprint = 0;
        self.store.close_all()
    }

    // == Bulk Redirect ==
    /// Starts spooling writes into hash-partitioned files.
    pub fn redirect(&mut self) -> Result<()> {
        if !matches!(self.mode, CacheMode::Normal) {
            return Err(CacheError::InvalidRequest(format!(
                "cannot redirect while {}",
                self.mode.name()
            )));
        }
        let spool = SpoolSet::create(&self.spool_dir, self.spool_partitions)?;
        info!(
            "Redirecting attribute writes into {} spool partitions under {}",
            spool.len(),
            self.spool_dir.display()
        );
        self.mode = CacheMode::Redirecting(spool);
        Ok(())
    }

    /// Ends redirection and replays every spooled write through `put`.
    ///
    /// Partitions are replayed in order, each front to back, and removed
    /// once exhausted. A write that fails is logged and skipped so the rest
    /// of the spool still lands; a partition that turns out to be damaged
    /// is abandoned at the damage. Returns the number of writes replayed,
    /// or an error summarising the failures once every partition has been
    /// visited.
    pub fn pass2(&mut self) -> Result<u64> {
        let spool = match std::mem::take(&mut self.mode) {
            CacheMode::Redirecting(spool) => spool,
            other => {
                let err = CacheError::InvalidRequest(format!(
                    "cannot replay spool while {}",
                    other.name()
                ));
                self.mode = other;
                return Err(err);
            }
        };

        info!("Second pass: replaying {} spool partitions", spool.len());
        let mut replayed = 0;
        let mut failed = 0;
        let mut damaged = None;
        for (i, mut partition) in spool.into_partitions().into_iter().enumerate() {
            let mut reader = match partition.reader() {
                Ok(reader) => reader,
                Err(e) => {
                    error!("Spool partition {} unreadable: {}", i, e);
                    damaged.get_or_insert(e);
                    continue;
                }
            };
            loop {
                match reader.next_record() {
                    Ok(Some((key, payload))) => match self.put(key, &payload) {
                        Ok(()) => replayed += 1,
                        Err(e) => {
                            error!("Second pass: dropping spooled write to {}: {}", key, e);
                            failed += 1;
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        error!("Spool partition {} damaged: {}", i, e);
                        damaged.get_or_insert(e);
                        break;
                    }
                }
            }
            info!("Spool partition {}: {} records", i, partition.records());
        }

        if let Some(e) = damaged {
            return Err(e);
        }
        if failed > 0 {
            return Err(CacheError::StoreInsert(format!(
                "{} of {} spooled writes could not be replayed",
                failed,
                replayed + failed
            )));
        }
        Ok(replayed)
    }

    /// Abandons redirection, discarding every spooled write.
    pub fn cleanup(&mut self) {
        if !self.is_redirected() {
            return;
        }
        if let CacheMode::Redirecting(spool) = std::mem::take(&mut self.mode) {
            info!("Discarding {} spool partitions", spool.len());
        }
    }

    // == Write Protect ==
    /// Raises or lowers write protection.
    pub fn set_write_protected(&mut self, protect: bool) -> Result<()> {
        match (&self.mode, protect) {
            (CacheMode::Normal, true) => {
                info!("Attribute store is now write-protected");
                self.mode = CacheMode::WriteProtected;
            }
            (CacheMode::WriteProtected, false) => {
                info!("Attribute store write protection lifted");
                self.mode = CacheMode::Normal;
            }
            (CacheMode::Normal, false) | (CacheMode::WriteProtected, true) => {}
            (CacheMode::Redirecting(_), _) => {
                return Err(CacheError::InvalidRequest(
                    "cannot change write protection while redirecting".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_write_protected(&self) -> bool {
        matches!(self.mode, CacheMode::WriteProtected)
    }

    pub fn is_redirected(&self) -> bool {
        matches!(self.mode, CacheMode::Redirecting(_))
    }

    pub fn mode(&self) -> &CacheMode {
        &self.mode
    }

    // == Introspection ==
    /// Current statistics with gauges refreshed.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_gauges(self.lru.len(), self.footprint);
        stats
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn footprint(&self) -> usize {
        self.footprint
    }

    /// Number of cached entries, negative ones included.
    pub fn len(&self) -> usize {
        self.lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.is_empty()
    }

    /// Whether `key` currently has a cache entry (positive or negative).
    pub fn is_cached(&self, key: AttrKey) -> bool {
        self.index.find(&key.to_bytes()).is_some()
    }

    /// Keys from most to least recently used.
    pub fn recency(&self) -> impl Iterator<Item = AttrKey> + '_ {
        self.lru.iter().map(|entry| entry.key)
    }

    /// Number of store records filed under `key`.
    pub fn store_records(&self, key: AttrKey) -> usize {
        let hash = key.store_hash();
        let mut count = 0;
        let mut cursor = self.store.find_first_key(hash);
        while let Some(c) = cursor {
            if self.record_matches(c, key) {
                count += 1;
            }
            cursor = self.store.find_next_key(c, hash);
        }
        count
    }

    // == Internals ==
    fn record_matches(&self, cursor: crate::store::Cursor, key: AttrKey) -> bool {
        self.store
            .copy(cursor)
            .and_then(|rec| decode_record(&rec).map(|(k, _)| k == key))
            .unwrap_or(false)
    }

    fn read_store(&self, key: AttrKey) -> Option<Vec<u8>> {
        let hash = key.store_hash();
        let mut cursor = self.store.find_first_key(hash);
        while let Some(c) = cursor {
            if let Some(record) = self.store.copy(c) {
                if let Some((k, payload)) = decode_record(&record) {
                    if k == key {
                        return Some(payload.to_vec());
                    }
                }
            }
            cursor = self.store.find_next_key(c, hash);
        }
        None
    }

    /// Removes every store record for `key`, duplicates included.
    fn purge_store(&mut self, key: AttrKey) -> Result<()> {
        let hash = key.store_hash();
        let mut cursor = self.store.find_first_key(hash);
        while let Some(c) = cursor {
            if self.record_matches(c, key) {
                self.store.remove(c)?;
            }
            cursor = self.store.find_next_key(c, hash);
        }
        Ok(())
    }

    fn admit(&mut self, entry: CacheEntry) {
        let key = entry.key.to_bytes();
        self.footprint += entry.footprint();
        let handle = self.lru.push_front(entry);
        self.index.insert(&key, handle);
    }

    fn evict(&mut self, key: AttrKey) {
        if let Some(handle) = self.index.remove(&key.to_bytes()) {
            if let Some(entry) = self.lru.remove(handle) {
                self.footprint = self.footprint.saturating_sub(entry.footprint());
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{colliding_keys, ENTRY_HEADER_SIZE};
    use crate::store::{Cursor, MemoryStore, PersistentStore};
    use tempfile::tempdir;

    fn config(max_cache_size: usize) -> Config {
        Config {
            max_cache_size,
            ..Config::default()
        }
    }

    fn cache(max_cache_size: usize) -> AttributeCache {
        AttributeCache::open(Box::new(MemoryStore::new()), &config(max_cache_size))
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = cache(4096);
        let key = AttrKey::new(5, 10);

        cache.put(key, b"hello").unwrap();
        assert_eq!(cache.get(key), Some(b"hello".to_vec()));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.footprint(), ENTRY_HEADER_SIZE + 5);
    }

    #[test]
    fn test_get_missing_caches_negative_entry() {
        let mut cache = cache(4096);
        let key = AttrKey::new(1, 1);

        assert_eq!(cache.get(key), None);
        assert!(cache.is_cached(key));
        assert_eq!(cache.footprint(), ENTRY_HEADER_SIZE);

        assert_eq!(cache.get(key), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.negative_hits, 1);
    }

    #[test]
    fn test_get_reads_through_to_store() {
        let mut store = MemoryStore::new();
        let key = AttrKey::new(9, 2);
        store
            .insert(key.store_hash(), &encode_record(&key, b"durable"))
            .unwrap();
        let mut cache = AttributeCache::open(Box::new(store), &config(4096));

        assert!(!cache.is_cached(key));
        assert_eq!(cache.get(key), Some(b"durable".to_vec()));
        assert!(cache.is_cached(key));
        assert_eq!(cache.stats().store_hits, 1);
    }

    #[test]
    fn test_put_rejects_empty_value() {
        let mut cache = cache(4096);
        let key = AttrKey::new(5, 10);

        assert!(matches!(
            cache.put(key, b""),
            Err(CacheError::InvalidRequest(_))
        ));
        assert!(cache.is_empty());
        assert_eq!(cache.store_records(key), 0);
    }

    #[test]
    fn test_overwrite_leaves_one_store_record() {
        let mut cache = cache(4096);
        let key = AttrKey::new(5, 10);

        cache.put(key, b"a much longer first value").unwrap();
        cache.put(key, b"short").unwrap();

        assert_eq!(cache.get(key), Some(b"short".to_vec()));
        assert_eq!(cache.store_records(key), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.footprint(), ENTRY_HEADER_SIZE + 5);
    }

    #[test]
    fn test_put_purges_duplicate_store_records() {
        let mut store = MemoryStore::new();
        let key = AttrKey::new(4, 4);
        for v in [&b"one"[..], b"two"] {
            store.insert(key.store_hash(), &encode_record(&key, v)).unwrap();
        }
        let mut cache = AttributeCache::open(Box::new(store), &config(4096));
        assert_eq!(cache.store_records(key), 2);

        cache.put(key, b"three").unwrap();
        assert_eq!(cache.store_records(key), 1);
    }

    #[test]
    fn test_bound_of_one_entry_keeps_latest() {
        let k1 = AttrKey::new(1, 10);
        let k2 = AttrKey::new(2, 10);
        let mut cache = cache(ENTRY_HEADER_SIZE + 5);

        cache.put(k1, b"aaaaa").unwrap();
        cache.put(k2, b"bbbbb").unwrap();

        assert!(!cache.is_cached(k1));
        assert!(cache.is_cached(k2));
        assert_eq!(cache.len(), 1);

        // Re-derived from the store, which now pushes k2 out.
        assert_eq!(cache.get(k1), Some(b"aaaaa".to_vec()));
        assert!(!cache.is_cached(k2));
    }

    #[test]
    fn test_footprint_arithmetic_example() {
        let small = AttrKey::new(5, 10);
        let large = AttrKey::new(6, 10);
        let mut cache = cache(64);

        cache.put(small, b"hello").unwrap();
        assert_eq!(cache.footprint(), 37);

        // 37 + 57 > 64, so the older entry goes
        cache.put(large, b"worldworldworldworldworld").unwrap();
        assert_eq!(cache.footprint(), 57);
        assert!(!cache.is_cached(small));

        assert_eq!(cache.get(small), Some(b"hello".to_vec()));
        assert_eq!(cache.footprint(), 37);
        assert!(!cache.is_cached(large));
    }

    #[test]
    fn test_get_promotes_entry() {
        let a = AttrKey::new(1, 1);
        let b = AttrKey::new(2, 1);
        let c = AttrKey::new(3, 1);
        let mut cache = cache(4096);

        cache.put(a, b"a").unwrap();
        cache.put(b, b"b").unwrap();
        cache.put(c, b"c").unwrap();
        cache.get(a);

        assert_eq!(cache.recency().collect::<Vec<_>>(), vec![a, c, b]);
    }

    #[test]
    fn test_del_removes_without_negative_entry() {
        let mut cache = cache(4096);
        let key = AttrKey::new(5, 10);

        cache.put(key, b"hello").unwrap();
        cache.del(key).unwrap();

        assert!(!cache.is_cached(key));
        assert_eq!(cache.store_records(key), 0);
        assert_eq!(cache.footprint(), 0);

        assert_eq!(cache.get(key), None);
        assert!(cache.is_cached(key));
    }

    #[test]
    fn test_write_protect_rejects_mutation() {
        let mut cache = cache(4096);
        let key = AttrKey::new(5, 10);
        cache.put(key, b"hello").unwrap();

        cache.set_write_protected(true).unwrap();
        assert!(matches!(
            cache.put(key, b"changed"),
            Err(CacheError::WriteRejected(_))
        ));
        assert!(matches!(cache.del(key), Err(CacheError::WriteRejected(_))));
        assert_eq!(cache.get(key), Some(b"hello".to_vec()));

        cache.set_write_protected(false).unwrap();
        cache.put(key, b"changed").unwrap();
        assert_eq!(cache.get(key), Some(b"changed".to_vec()));
    }

    #[test]
    fn test_oversized_value_is_clamped() {
        let mut cache = AttributeCache::open(
            Box::new(MemoryStore::new()),
            &Config {
                max_record_len: 4,
                ..Config::default()
            },
        );
        let key = AttrKey::new(1, 1);

        cache.put(key, b"abcdefgh").unwrap();
        assert_eq!(cache.get(key), Some(b"abcd".to_vec()));

        cache.put(key, "abcé".as_bytes()).unwrap();
        assert_eq!(cache.get(key), Some(b"abc".to_vec()));
    }

    #[test]
    fn test_standalone_bypasses_cache() {
        let mut cache = AttributeCache::open(
            Box::new(MemoryStore::new()),
            &Config {
                standalone: true,
                ..Config::default()
            },
        );
        let key = AttrKey::new(1, 1);

        cache.put(key, b"value").unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.get(key), Some(b"value".to_vec()));
        assert_eq!(cache.get(AttrKey::new(2, 2)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_redirect_and_pass2() {
        let dir = tempdir().unwrap();
        let mut cache = AttributeCache::open(
            Box::new(MemoryStore::new()),
            &Config {
                spool_dir: dir.path().to_path_buf(),
                ..Config::default()
            },
        );
        let key = AttrKey::new(3, 7);

        cache.redirect().unwrap();
        assert!(cache.is_redirected());
        cache.put(key, b"first").unwrap();
        cache.put(key, b"second").unwrap();
        assert_eq!(cache.store_records(key), 0);
        assert!(cache.is_empty());

        assert_eq!(cache.pass2().unwrap(), 2);
        assert!(!cache.is_redirected());
        assert_eq!(cache.get(key), Some(b"second".to_vec()));
        assert_eq!(cache.store_records(key), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_discards_spool() {
        let dir = tempdir().unwrap();
        let mut cache = AttributeCache::open(
            Box::new(MemoryStore::new()),
            &Config {
                spool_dir: dir.path().to_path_buf(),
                spool_partitions: 4,
                ..Config::default()
            },
        );
        let key = AttrKey::new(3, 7);

        cache.redirect().unwrap();
        cache.put(key, b"lost").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);

        cache.cleanup();
        assert!(!cache.is_redirected());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(cache.get(key), None);
    }

    #[test]
    fn test_mode_transitions_are_guarded() {
        let dir = tempdir().unwrap();
        let mut cache = AttributeCache::open(
            Box::new(MemoryStore::new()),
            &Config {
                spool_dir: dir.path().to_path_buf(),
                ..Config::default()
            },
        );

        assert!(cache.pass2().is_err());
        cache.set_write_protected(true).unwrap();
        assert!(cache.redirect().is_err());
        assert!(cache.pass2().is_err());
        assert!(cache.is_write_protected());

        cache.set_write_protected(false).unwrap();
        cache.redirect().unwrap();
        assert!(cache.set_write_protected(true).is_err());
        assert!(cache.redirect().is_err());
        cache.cleanup();
    }

    /// Store whose next `failures` inserts are refused.
    #[derive(Debug)]
    struct FailingStore {
        inner: MemoryStore,
        failures: usize,
    }

    impl FailingStore {
        fn failing(failures: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures,
            }
        }
    }

    impl PersistentStore for FailingStore {
        fn insert(&mut self, hash: u32, record: &[u8]) -> Result<()> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(CacheError::Internal("store full".to_string()));
            }
            self.inner.insert(hash, record)
        }
        fn remove(&mut self, cursor: Cursor) -> Result<()> {
            self.inner.remove(cursor)
        }
        fn copy(&self, cursor: Cursor) -> Option<Vec<u8>> {
            self.inner.copy(cursor)
        }
        fn find_first_key(&self, hash: u32) -> Option<Cursor> {
            self.inner.find_first_key(hash)
        }
        fn find_next_key(&self, cursor: Cursor, hash: u32) -> Option<Cursor> {
            self.inner.find_next_key(cursor, hash)
        }
        fn sync(&mut self) -> Result<()> {
            Ok(())
        }
        fn tick(&mut self) -> Result<()> {
            Ok(())
        }
        fn close_all(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_store_insert_failure_is_not_cached() {
        let mut cache = AttributeCache::open(Box::new(FailingStore::failing(usize::MAX)), &config(4096));
        let key = AttrKey::new(5, 10);

        assert!(matches!(
            cache.put(key, b"hello"),
            Err(CacheError::StoreInsert(_))
        ));
        assert!(!cache.is_cached(key));
        assert_eq!(cache.get(key), None);
    }

    #[test]
    fn test_pass2_keeps_replaying_after_failed_write() {
        let dir = tempdir().unwrap();
        let mut cache = AttributeCache::open(
            Box::new(FailingStore::failing(1)),
            &Config {
                spool_dir: dir.path().to_path_buf(),
                spool_partitions: 1,
                ..Config::default()
            },
        );
        let keys: Vec<AttrKey> = (0..10).map(|attr| AttrKey::new(0, attr + 1)).collect();

        cache.redirect().unwrap();
        for key in &keys {
            cache.put(*key, b"imported").unwrap();
        }

        assert!(matches!(cache.pass2(), Err(CacheError::StoreInsert(_))));
        assert!(!cache.is_redirected());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // Only the first replayed write hit the refusing store
        assert_eq!(cache.get(keys[0]), None);
        for key in &keys[1..] {
            assert_eq!(cache.get(*key), Some(b"imported".to_vec()), "{}", key);
        }
    }

    #[test]
    fn test_colliding_keys_stay_distinct() {
        let (a, b) = colliding_keys();
        assert_ne!(a, b);
        assert_eq!(a.store_hash(), b.store_hash());
        let mut cache = cache(4096);

        cache.put(a, b"first").unwrap();
        cache.put(b, b"second").unwrap();
        assert_eq!(cache.get(a), Some(b"first".to_vec()));
        assert_eq!(cache.get(b), Some(b"second".to_vec()));

        // Overwriting one key purges only its own store record
        cache.put(a, b"again").unwrap();
        assert_eq!(cache.store_records(a), 1);
        assert_eq!(cache.store_records(b), 1);

        cache.del(b).unwrap();
        assert_eq!(cache.store_records(a), 1);
        assert_eq!(cache.store_records(b), 0);
        assert_eq!(cache.get(a), Some(b"again".to_vec()));
        assert_eq!(cache.get(b), None);
    }

    #[test]
    fn test_colliding_key_read_through_rechecks_key() {
        let (a, b) = colliding_keys();
        let mut store = MemoryStore::new();
        store
            .insert(a.store_hash(), &encode_record(&a, b"only a"))
            .unwrap();
        let mut cache = AttributeCache::open(Box::new(store), &config(4096));

        assert_eq!(cache.get(b), None);
        assert_eq!(cache.get(a), Some(b"only a".to_vec()));
        assert_eq!(cache.stats().negative_hits, 0);
    }
}
