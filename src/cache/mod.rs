//! Cache Module
//!
//! The attribute cache with LRU eviction under a footprint bound, the
//! bulk-load spool, and the player accounting cache.

mod attribute;
mod entry;
mod lru;
mod player;
mod record;
mod spool;
mod stats;


// Re-export public types
pub use attribute::{AttributeCache, CacheMode};
pub use entry::{CacheEntry, ENTRY_HEADER_SIZE};
pub use lru::{Handle, LruList};
pub use player::{
    parse_leading_int, strip_owner_flags, AttributeAccess, PlayerCache, PlayerEntry, MONEY_ATTR,
    QUEUE_MAX_ATTR,
};
pub use record::{
    clamp_payload, decode_record, encode_record, AttrKey, AttrNum, ObjectId, KEY_SIZE,
};
#[cfg(test)]
pub(crate) use record::colliding_keys;
pub use spool::{SpoolPartition, SpoolReader, SpoolSet};
pub use stats::CacheStats;

// == Attribute Access ==
impl AttributeAccess for AttributeCache {
    fn read_raw(&mut self, object: ObjectId, attr: AttrNum) -> Option<String> {
        self.get(AttrKey::new(object, attr))
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    fn add_raw(&mut self, object: ObjectId, attr: AttrNum, value: &str) -> crate::error::Result<()> {
        self.put(AttrKey::new(object, attr), value.as_bytes())
    }
}
