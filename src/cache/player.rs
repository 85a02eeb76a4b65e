//! Player Cache Module
//!
//! Money and queued-command accounting for players, kept hot in memory.
//!
//! Entries are created on first touch by reading two attributes through
//! [`AttributeAccess`]. Money changes are held in the entry and written
//! back lazily by [`PlayerCache::sync`] or when the entry is aged out.
//!
//! Aging is a one-bit clock: every `find` sets the entry's reference flag,
//! every `trim` clears it, and an entry found with the flag already clear
//! (and no queued commands) is saved and dropped.

use tracing::{debug, warn};

use crate::cache::{AttrNum, ObjectId};
use crate::error::Result;
use crate::index::KeyedIndex;

/// Attribute holding a player's money.
pub const MONEY_ATTR: AttrNum = 41;

/// Attribute holding a player's queued-command limit override.
pub const QUEUE_MAX_ATTR: AttrNum = 213;

/// Marker opening an owner/flags prefix on a raw attribute value.
const ATTR_INFO_MARKER: char = '\x01';

// == Attribute Access ==
/// Raw attribute primitives the player cache reads and writes through.
pub trait AttributeAccess {
    /// Raw text of an attribute, or `None` if it is not set.
    fn read_raw(&mut self, object: ObjectId, attr: AttrNum) -> Option<String>;

    /// Sets an attribute to `value`.
    fn add_raw(&mut self, object: ObjectId, attr: AttrNum, value: &str) -> Result<()>;
}

// == Player Entry ==
/// Cached accounting for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEntry {
    pub player: ObjectId,
    pub money: i32,
    /// Commands currently queued on the player's behalf
    pub queue: i32,
    /// Explicit queue limit, or -1 when unset
    pub queue_max: i32,
    referenced: bool,
    money_dirty: bool,
    next: Option<ObjectId>,
}

impl PlayerEntry {
    fn new(player: ObjectId, next: Option<ObjectId>) -> Self {
        Self {
            player,
            money: 0,
            queue: 0,
            queue_max: -1,
            referenced: true,
            money_dirty: false,
            next,
        }
    }

    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    /// Whether money has changed since it was last written back.
    pub fn is_dirty(&self) -> bool {
        self.money_dirty
    }

    /// Re-reads money and the queue limit from the backing attributes.
    fn load<A: AttributeAccess + ?Sized>(&mut self, attrs: &mut A) {
        match attrs.read_raw(self.player, MONEY_ATTR) {
            Some(text) if !text.is_empty() => self.money = parse_leading_int(&text),
            _ => {
                self.money = 0;
                self.money_dirty = true;
            }
        }

        self.queue_max = attrs
            .read_raw(self.player, QUEUE_MAX_ATTR)
            .filter(|text| !text.is_empty())
            .map(|text| parse_leading_int(strip_owner_flags(&text)))
            .filter(|&m| m >= 0)
            .unwrap_or(-1);
    }

    /// Writes dirty money back; no-op for a clean entry.
    fn save<A: AttributeAccess + ?Sized>(&mut self, attrs: &mut A) -> Result<()> {
        if self.money_dirty {
            attrs.add_raw(self.player, MONEY_ATTR, &self.money.to_string())?;
            self.money_dirty = false;
        }
        Ok(())
    }
}

// == Player Cache ==
#[derive(Debug)]
pub struct PlayerCache {
    index: KeyedIndex<PlayerEntry>,
    /// Most recently created entry; chain runs through `PlayerEntry::next`
    head: Option<ObjectId>,
    default_queue_max: i32,
}

impl PlayerCache {
    pub fn new(default_queue_max: i32) -> Self {
        Self {
            index: KeyedIndex::new(),
            head: None,
            default_queue_max,
        }
    }

    // == Find ==
    /// Returns the player's entry, creating and loading it on first use.
    pub fn find<A: AttributeAccess + ?Sized>(
        &mut self,
        attrs: &mut A,
        player: ObjectId,
    ) -> &mut PlayerEntry {
        let head = self.head;
        let mut created = false;
        let entry = self.index.get_or_insert_with(&player.to_le_bytes(), || {
            created = true;
            PlayerEntry::new(player, head)
        });
        if created {
            entry.load(attrs);
            self.head = Some(player);
            debug!("Player {} cached", player);
        } else {
            entry.referenced = true;
        }
        entry
    }

    /// Looks at an entry without creating it or marking it referenced.
    pub fn get(&self, player: ObjectId) -> Option<&PlayerEntry> {
        self.index.find(&player.to_le_bytes())
    }

    // == Reload ==
    /// Flushes the entry, then re-reads it from the backing attributes.
    pub fn reload<A: AttributeAccess + ?Sized>(
        &mut self,
        attrs: &mut A,
        player: ObjectId,
    ) -> Result<()> {
        let entry = self.find(attrs, player);
        entry.save(attrs)?;
        entry.load(attrs);
        Ok(())
    }

    // == Trim ==
    /// One sweep of the aging clock. Returns the number of entries dropped.
    ///
    /// An entry whose write-back fails is kept so its money is not lost.
    pub fn trim<A: AttributeAccess + ?Sized>(&mut self, attrs: &mut A) -> usize {
        let mut removed = 0;
        let mut prev: Option<ObjectId> = None;
        let mut cursor = self.head;

        while let Some(player) = cursor {
            let key = player.to_le_bytes();
            let Some(entry) = self.index.find_mut(&key) else {
                break;
            };
            let next = entry.next;

            let keep = if entry.queue != 0 || entry.referenced {
                entry.referenced = false;
                true
            } else if let Err(e) = entry.save(attrs) {
                warn!("Keeping player {}: money write-back failed: {}", player, e);
                true
            } else {
                false
            };

            if keep {
                prev = Some(player);
            } else {
                self.index.remove(&key);
                match prev.and_then(|p| self.index.find_mut(&p.to_le_bytes())) {
                    Some(p) => p.next = next,
                    None => self.head = next,
                }
                removed += 1;
            }
            cursor = next;
        }

        if removed > 0 {
            debug!("Player cache trim dropped {} entries", removed);
        }
        removed
    }

    // == Sync ==
    /// Writes back every dirty entry. Returns the number written.
    ///
    /// The whole chain is walked even when a write-back fails; the failed
    /// entries stay dirty and the first error is returned at the end.
    pub fn sync<A: AttributeAccess + ?Sized>(&mut self, attrs: &mut A) -> Result<usize> {
        let mut written = 0;
        let mut first_error = None;
        let mut cursor = self.head;
        while let Some(player) = cursor {
            let Some(entry) = self.index.find_mut(&player.to_le_bytes()) else {
                break;
            };
            if entry.money_dirty {
                match entry.save(attrs) {
                    Ok(()) => written += 1,
                    Err(e) => {
                        warn!("Player {}: money write-back failed: {}", player, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
            cursor = entry.next;
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    // == Remove ==
    /// Writes the entry back and drops it from the cache.
    ///
    /// Returns whether an entry was cached. On a failed write-back the
    /// entry is kept and the error returned.
    pub fn remove<A: AttributeAccess + ?Sized>(
        &mut self,
        attrs: &mut A,
        player: ObjectId,
    ) -> Result<bool> {
        let key = player.to_le_bytes();
        let Some(entry) = self.index.find_mut(&key) else {
            return Ok(false);
        };
        entry.save(attrs)?;
        let next = entry.next;
        self.index.remove(&key);

        if self.head == Some(player) {
            self.head = next;
        } else {
            let mut cursor = self.head;
            while let Some(p) = cursor {
                let Some(prev) = self.index.find_mut(&p.to_le_bytes()) else {
                    break;
                };
                if prev.next == Some(player) {
                    prev.next = next;
                    break;
                }
                cursor = prev.next;
            }
        }
        debug!("Player {} uncached", player);
        Ok(true)
    }

    // == Queue Accounting ==
    /// Adds `delta` to the player's queued-command count.
    pub fn adjust_queue<A: AttributeAccess + ?Sized>(
        &mut self,
        attrs: &mut A,
        player: ObjectId,
        delta: i32,
    ) -> i32 {
        let entry = self.find(attrs, player);
        entry.queue = entry.queue.saturating_add(delta);
        entry.queue
    }

    /// The player's queued-command limit.
    ///
    /// Without an override this is the global default, raised for a
    /// privileged player to at least `db_top + 1`.
    pub fn queue_max<A: AttributeAccess + ?Sized>(
        &mut self,
        attrs: &mut A,
        player: ObjectId,
        privileged: bool,
        db_top: ObjectId,
    ) -> i32 {
        let default_queue_max = self.default_queue_max;
        let entry = self.find(attrs, player);
        if entry.queue_max >= 0 {
            return entry.queue_max;
        }
        let floor = db_top.saturating_add(1);
        if privileged && default_queue_max < floor {
            floor
        } else {
            default_queue_max
        }
    }

    // == Money ==
    pub fn money<A: AttributeAccess + ?Sized>(&mut self, attrs: &mut A, player: ObjectId) -> i32 {
        self.find(attrs, player).money
    }

    /// Sets money in the cache; it reaches the attribute on the next save.
    pub fn set_money<A: AttributeAccess + ?Sized>(
        &mut self,
        attrs: &mut A,
        player: ObjectId,
        money: i32,
    ) {
        let entry = self.find(attrs, player);
        entry.money = money;
        entry.money_dirty = true;
    }

    /// Writes money straight to the attribute, leaving the cache alone.
    ///
    /// For database loading, when the object's type is not yet known.
    pub fn set_money_direct<A: AttributeAccess + ?Sized>(
        attrs: &mut A,
        object: ObjectId,
        money: i32,
    ) -> Result<()> {
        attrs.add_raw(object, MONEY_ATTR, &money.to_string())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Players in chain order, newest first.
    pub fn players(&self) -> impl Iterator<Item = ObjectId> + '_ {
        std::iter::successors(self.head, |p| {
            self.index.find(&p.to_le_bytes()).and_then(|e| e.next)
        })
    }
}

// == Text Helpers ==
/// Parses a leading signed decimal integer.
///
/// Leading whitespace is skipped and trailing text ignored. Text without
/// digits yields 0; values out of range saturate.
pub fn parse_leading_int(text: &str) -> i32 {
    let s = text.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    let value = if negative { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Strips an `\x01owner:flags:` prefix, returning the bare value.
pub fn strip_owner_flags(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(ATTR_INFO_MARKER) else {
        return text;
    };
    rest.splitn(3, ':').nth(2).unwrap_or("")
}
