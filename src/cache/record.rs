//! Attribute Record Module
//!
//! The composite attribute key and the on-disk record layout.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::index::hash_bytes;

/// Database object identifier.
pub type ObjectId = i32;

/// Attribute slot number on an object.
pub type AttrNum = i32;

/// Encoded size of an [`AttrKey`].
pub const KEY_SIZE: usize = 8;

// == Attribute Key ==
/// Identity of one attribute slot on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttrKey {
    pub object: ObjectId,
    pub attr: AttrNum,
}

impl AttrKey {
    pub const fn new(object: ObjectId, attr: AttrNum) -> Self {
        Self { object, attr }
    }

    /// Fixed little-endian encoding, object first.
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        let mut buf = [0u8; KEY_SIZE];
        buf[..4].copy_from_slice(&self.object.to_le_bytes());
        buf[4..].copy_from_slice(&self.attr.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let object = bytes.get(..4)?.try_into().ok()?;
        let attr = bytes.get(4..KEY_SIZE)?.try_into().ok()?;
        Some(Self {
            object: ObjectId::from_le_bytes(object),
            attr: AttrNum::from_le_bytes(attr),
        })
    }

    /// Hash under which the record is filed in the persistent store.
    pub fn store_hash(&self) -> u32 {
        hash_bytes(&self.to_bytes())
    }
}

/// Two distinct keys filed under the same store hash.
#[cfg(test)]
pub(crate) fn colliding_keys() -> (AttrKey, AttrKey) {
    let mut seen = std::collections::HashMap::new();
    for object in 0..ObjectId::MAX {
        let key = AttrKey::new(object, 0);
        if let Some(earlier) = seen.insert(key.store_hash(), key) {
            return (earlier, key);
        }
    }
    unreachable!("no store hash collision among non-negative object ids")
}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.object, self.attr)
    }
}

// == Record Codec ==
/// Lays out a durable record: key bytes followed by the payload.
pub fn encode_record(key: &AttrKey, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(KEY_SIZE + payload.len());
    buf.extend_from_slice(&key.to_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Splits a durable record back into key and payload.
pub fn decode_record(record: &[u8]) -> Option<(AttrKey, &[u8])> {
    let key = AttrKey::from_bytes(record)?;
    Some((key, &record[KEY_SIZE..]))
}

// == Payload Clamp ==
/// Cuts `value` to at most `max` bytes without splitting a UTF-8 sequence.
///
/// The cut point backs up over continuation bytes, so a clamped payload
/// may come out a few bytes shorter than `max`.
pub fn clamp_payload(value: &[u8], max: usize) -> &[u8] {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while end > 0 && is_continuation(value[end]) {
        end -= 1;
    }
    &value[..end]
}

#[inline]
fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bytes() {
        let key = AttrKey::new(5, 10);
        let bytes = key.to_bytes();
        assert_eq!(AttrKey::from_bytes(&bytes), Some(key));
        assert_eq!(AttrKey::from_bytes(&bytes[..7]), None);
    }

    #[test]
    fn test_negative_ids_survive_encoding() {
        let key = AttrKey::new(-1, i32::MAX);
        assert_eq!(AttrKey::from_bytes(&key.to_bytes()), Some(key));
    }

    #[test]
    fn test_store_hash_is_stable() {
        let a = AttrKey::new(5, 10);
        assert_eq!(a.store_hash(), AttrKey::new(5, 10).store_hash());
        assert_ne!(a.store_hash(), AttrKey::new(10, 5).store_hash());
    }

    #[test]
    fn test_record_layout() {
        let key = AttrKey::new(7, 3);
        let record = encode_record(&key, b"hello");
        assert_eq!(record.len(), KEY_SIZE + 5);

        let (k, payload) = decode_record(&record).unwrap();
        assert_eq!(k, key);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn test_display() {
        assert_eq!(AttrKey::new(5, 10).to_string(), "(5,10)");
    }

    #[test]
    fn test_clamp_ascii() {
        assert_eq!(clamp_payload(b"hello", 10), b"hello");
        assert_eq!(clamp_payload(b"hello", 3), b"hel");
    }

    #[test]
    fn test_clamp_backs_off_multibyte() {
        // "aé" is 61 C3 A9; cutting at 2 would split the é
        let text = "aé".as_bytes();
        assert_eq!(clamp_payload(text, 2), b"a");
        assert!(std::str::from_utf8(clamp_payload("ééé".as_bytes(), 5)).is_ok());
    }
}
