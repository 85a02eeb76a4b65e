//! Engine Module
//!
//! Owns the attribute cache, the player cache and the object model, and
//! routes money and queue accounting to whichever of them applies.

use tracing::{info, warn};

use crate::cache::{
    parse_leading_int, AttrKey, AttributeAccess, AttributeCache, ObjectId, PlayerCache,
    MONEY_ATTR,
};
use crate::config::Config;
use crate::error::Result;
use crate::objects::{ObjectInfo, ObjectModel, ObjectTable};
use crate::store::BoxStore;

// == Player View ==
/// Snapshot of a player's cached accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerView {
    pub player: ObjectId,
    pub money: i32,
    pub queue: i32,
    pub queue_max: i32,
    pub dirty: bool,
}

// == Engine ==
#[derive(Debug)]
pub struct Engine {
    attrs: AttributeCache,
    players: PlayerCache,
    objects: ObjectTable,
    standalone: bool,
}

impl Engine {
    // == Constructor ==
    pub fn open(store: BoxStore, config: &Config) -> Self {
        Self {
            attrs: AttributeCache::open(store, config),
            players: PlayerCache::new(config.queue_max),
            objects: ObjectTable::new(),
            standalone: config.standalone,
        }
    }

    pub fn attrs(&self) -> &AttributeCache {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut AttributeCache {
        &mut self.attrs
    }

    pub fn players(&self) -> &PlayerCache {
        &self.players
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Adds or replaces an object. Returns `false` for a negative id.
    ///
    /// An object that stops being a player has its cached accounting
    /// written back and dropped first; from then on its money lives only in
    /// the attribute.
    pub fn register_object(&mut self, object: ObjectId, info: ObjectInfo) -> Result<bool> {
        if object < 0 {
            return Ok(false);
        }
        if !info.owns_others() && self.players.remove(&mut self.attrs, object)? {
            info!("Object {} is no longer a player; accounting flushed", object);
        }
        Ok(self.objects.register(object, info))
    }

    /// Valid objects that own others keep their accounting in the player cache.
    fn is_player(&self, object: ObjectId) -> bool {
        self.objects.is_valid(object) && self.objects.owns_others(object)
    }

    fn uses_player_cache(&self, object: ObjectId) -> bool {
        !self.standalone && self.is_player(object)
    }

    // == Money ==
    /// Coins held by `object`; 0 for an invalid object.
    pub fn pennies(&mut self, object: ObjectId) -> i32 {
        if !self.objects.is_valid(object) {
            return 0;
        }
        if self.uses_player_cache(object) {
            return self.players.money(&mut self.attrs, object);
        }
        self.attrs
            .read_raw(object, MONEY_ATTR)
            .map_or(0, |text| parse_leading_int(&text))
    }

    /// Sets the coins held by `object`. Writes to invalid objects are ignored.
    pub fn set_pennies(&mut self, object: ObjectId, money: i32) -> Result<()> {
        if !self.objects.is_valid(object) {
            return Ok(());
        }
        if self.uses_player_cache(object) {
            self.players.set_money(&mut self.attrs, object, money);
            return Ok(());
        }
        PlayerCache::set_money_direct(&mut self.attrs, object, money)
    }

    /// Sets coins on the attribute directly, whatever the object is.
    pub fn set_pennies_direct(&mut self, object: ObjectId, money: i32) -> Result<()> {
        PlayerCache::set_money_direct(&mut self.attrs, object, money)
    }

    // == Queue Accounting ==
    /// Adjusts a player's queued-command count; 0 for non-players.
    pub fn adjust_queue(&mut self, object: ObjectId, delta: i32) -> i32 {
        if !self.is_player(object) {
            return 0;
        }
        self.players.adjust_queue(&mut self.attrs, object, delta)
    }

    /// A player's queued-command limit; 0 for non-players.
    pub fn queue_max(&mut self, object: ObjectId) -> i32 {
        if !self.is_player(object) {
            return 0;
        }
        let privileged = self.objects.is_privileged(object);
        let db_top = self.objects.db_top();
        self.players
            .queue_max(&mut self.attrs, object, privileged, db_top)
    }

    /// Re-reads a player's cached fields after an outside change.
    pub fn reload_player(&mut self, object: ObjectId) -> Result<()> {
        if !self.uses_player_cache(object) {
            return Ok(());
        }
        self.players.reload(&mut self.attrs, object)
    }

    /// Current accounting for a player, loading it if needed.
    pub fn player(&mut self, object: ObjectId) -> Option<PlayerView> {
        if !self.uses_player_cache(object) {
            return None;
        }
        let queue_max = self.queue_max(object);
        let entry = self.players.find(&mut self.attrs, object);
        Some(PlayerView {
            player: entry.player,
            money: entry.money,
            queue: entry.queue,
            queue_max,
            dirty: entry.is_dirty(),
        })
    }

    // == Maintenance ==
    /// Store housekeeping.
    pub fn tick(&mut self) -> Result<()> {
        self.attrs.tick()
    }

    /// One aging sweep over the player cache.
    pub fn trim_players(&mut self) -> usize {
        self.players.trim(&mut self.attrs)
    }

    /// Writes back player accounting, then makes the store durable.
    /// Returns the number of players written back.
    pub fn sync_all(&mut self) -> Result<usize> {
        let written = self.players.sync(&mut self.attrs)?;
        self.attrs.sync()?;
        Ok(written)
    }

    // == Bulk Import ==
    /// Loads a batch of attribute writes through the spool.
    ///
    /// On any failure the spool is discarded before the error is returned.
    pub fn bulk_import<I>(&mut self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = (AttrKey, Vec<u8>)>,
    {
        self.attrs.redirect()?;
        let result = records
            .into_iter()
            .try_for_each(|(key, value)| self.attrs.put(key, &value))
            .and_then(|()| self.attrs.pass2());

        match result {
            Ok(replayed) => {
                info!("Bulk import loaded {} attribute writes", replayed);
                Ok(replayed)
            }
            Err(e) => {
                warn!("Bulk import failed: {}", e);
                self.attrs.cleanup();
                Err(e)
            }
        }
    }

    // == Shutdown ==
    /// Flushes players and closes the store.
    ///
    /// The store is closed even when some players could not be written
    /// back; the first failure is reported.
    pub fn shutdown(mut self) -> Result<()> {
        let flushed = self.players.sync(&mut self.attrs);
        match &flushed {
            Ok(written) => info!("Shutdown: wrote back {} players", written),
            Err(e) => warn!("Shutdown: player write-back incomplete: {}", e),
        }
        let closed = self.attrs.close();
        flushed.and(closed)
    }
}
