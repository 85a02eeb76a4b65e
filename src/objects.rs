//! Object Model Module
//!
//! The small slice of the object database the player cache consults:
//! which objects exist, which of them own other objects (players), which
//! are privileged, and the highest object index in use.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::ObjectId;

/// Object properties relevant to money and queue accounting.
pub trait ObjectModel {
    /// Whether `object` names a live object.
    fn is_valid(&self, object: ObjectId) -> bool;

    /// Whether `object` can own other objects, making it eligible for
    /// the player cache.
    fn owns_others(&self, object: ObjectId) -> bool;

    /// Whether `object` gets the raised queue limit.
    fn is_privileged(&self, object: ObjectId) -> bool;

    /// Highest object index in use, or -1 for an empty database.
    fn db_top(&self) -> ObjectId;
}

// == Object Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Player,
    Thing,
    Room,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub kind: ObjectKind,
    #[serde(default)]
    pub privileged: bool,
}

impl ObjectInfo {
    /// Only players own other objects.
    pub fn owns_others(&self) -> bool {
        self.kind == ObjectKind::Player
    }
}

// == Object Table ==
/// In-memory [`ObjectModel`] filled in by registration.
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: HashMap<ObjectId, ObjectInfo>,
    top: Option<ObjectId>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an object. Negative ids are ignored.
    pub fn register(&mut self, object: ObjectId, info: ObjectInfo) -> bool {
        if object < 0 {
            return false;
        }
        self.objects.insert(object, info);
        self.top = Some(self.top.map_or(object, |t| t.max(object)));
        true
    }

}

impl ObjectModel for ObjectTable {
    fn is_valid(&self, object: ObjectId) -> bool {
        self.objects.contains_key(&object)
    }

    fn owns_others(&self, object: ObjectId) -> bool {
        self.objects.get(&object).is_some_and(ObjectInfo::owns_others)
    }

    fn is_privileged(&self, object: ObjectId) -> bool {
        self.objects.get(&object).is_some_and(|o| o.privileged)
    }

    fn db_top(&self) -> ObjectId {
        self.top.unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(privileged: bool) -> ObjectInfo {
        ObjectInfo {
            kind: ObjectKind::Player,
            privileged,
        }
    }

    #[test]
    fn test_empty_table() {
        let table = ObjectTable::new();
        assert!(!table.is_valid(0));
        assert_eq!(table.db_top(), -1);
    }

    #[test]
    fn test_register_tracks_top() {
        let mut table = ObjectTable::new();
        table.register(5, player(false));
        table.register(
            2,
            ObjectInfo {
                kind: ObjectKind::Thing,
                privileged: false,
            },
        );
        assert_eq!(table.db_top(), 5);
        assert!(table.owns_others(5));
        assert!(!table.owns_others(2));
        assert!(table.is_valid(2));
    }

    #[test]
    fn test_negative_id_rejected() {
        let mut table = ObjectTable::new();
        assert!(!table.register(-1, player(true)));
        assert!(!table.is_valid(-1));
        assert_eq!(table.db_top(), -1);
    }

    #[test]
    fn test_privileged() {
        let mut table = ObjectTable::new();
        table.register(1, player(true));
        table.register(2, player(false));
        assert!(table.is_privileged(1));
        assert!(!table.is_privileged(2));
        assert!(!table.is_privileged(3));
    }
}
