//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::{AttrKey, AttrNum, ObjectId};
use crate::objects::{ObjectInfo, ObjectKind};

/// Request body for PUT /attr
#[derive(Debug, Clone, Deserialize)]
pub struct PutAttrRequest {
    pub object: ObjectId,
    pub attr: AttrNum,
    /// The value to store
    pub value: String,
}

impl PutAttrRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.value.is_empty() {
            return Some("Value cannot be empty".to_string());
        }
        None
    }

    pub fn key(&self) -> AttrKey {
        AttrKey::new(self.object, self.attr)
    }
}

/// Request body for PUT /player/:id/money
#[derive(Debug, Clone, Deserialize)]
pub struct SetMoneyRequest {
    pub money: i32,
}

/// Request body for PUT /objects/:id
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterObjectRequest {
    pub kind: ObjectKind,
    #[serde(default)]
    pub privileged: bool,
}

impl From<RegisterObjectRequest> for ObjectInfo {
    fn from(req: RegisterObjectRequest) -> Self {
        ObjectInfo {
            kind: req.kind,
            privileged: req.privileged,
        }
    }
}

/// Request body for PUT /admin/write-protect
#[derive(Debug, Clone, Deserialize)]
pub struct WriteProtectRequest {
    pub enabled: bool,
}

/// One attribute write inside a bulk import
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRecord {
    pub object: ObjectId,
    pub attr: AttrNum,
    pub value: String,
}

/// Request body for POST /admin/import
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub records: Vec<ImportRecord>,
}

impl ImportRequest {
    pub fn into_writes(self) -> impl Iterator<Item = (AttrKey, Vec<u8>)> {
        self.records
            .into_iter()
            .map(|r| (AttrKey::new(r.object, r.attr), r.value.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_attr_request_deserialize() {
        let json = r#"{"object": 5, "attr": 10, "value": "hello"}"#;
        let req: PutAttrRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key(), AttrKey::new(5, 10));
        assert_eq!(req.value, "hello");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_empty_value() {
        let req = PutAttrRequest {
            object: 1,
            attr: 1,
            value: String::new(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_register_object_defaults() {
        let req: RegisterObjectRequest = serde_json::from_str(r#"{"kind": "player"}"#).unwrap();
        let info: ObjectInfo = req.into();
        assert_eq!(info.kind, ObjectKind::Player);
        assert!(!info.privileged);
    }

    #[test]
    fn test_import_request_writes() {
        let json = r#"{"records": [{"object": 1, "attr": 2, "value": "x"}]}"#;
        let req: ImportRequest = serde_json::from_str(json).unwrap();
        let writes: Vec<_> = req.into_writes().collect();
        assert_eq!(writes, vec![(AttrKey::new(1, 2), b"x".to_vec())]);
    }
}
