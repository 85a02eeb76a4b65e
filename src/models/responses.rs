//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{AttrKey, AttrNum, CacheStats, ObjectId};
use crate::engine::PlayerView;
use crate::objects::ObjectKind;

/// Response body for GET /attr/:object/:attr
#[derive(Debug, Clone, Serialize)]
pub struct AttrResponse {
    pub object: ObjectId,
    pub attr: AttrNum,
    /// The stored value
    pub value: String,
}

impl AttrResponse {
    pub fn new(key: AttrKey, value: &[u8]) -> Self {
        Self {
            object: key.object,
            attr: key.attr,
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }
}

/// Response body for attribute writes and deletes
#[derive(Debug, Clone, Serialize)]
pub struct AttrWriteResponse {
    /// Success message
    pub message: String,
    pub object: ObjectId,
    pub attr: AttrNum,
}

impl AttrWriteResponse {
    pub fn stored(key: AttrKey) -> Self {
        Self::new(key, "stored")
    }

    pub fn deleted(key: AttrKey) -> Self {
        Self::new(key, "deleted")
    }

    fn new(key: AttrKey, what: &str) -> Self {
        Self {
            message: format!("Attribute {} {}", key, what),
            object: key.object,
            attr: key.attr,
        }
    }
}

/// Response body for the player endpoints
#[derive(Debug, Clone, Serialize)]
pub struct PlayerResponse {
    pub player: ObjectId,
    pub money: i32,
    /// Commands currently queued
    pub queue: i32,
    /// Effective queued-command limit
    pub queue_max: i32,
    /// Money not yet written back to its attribute
    pub dirty: bool,
}

impl From<PlayerView> for PlayerResponse {
    fn from(view: PlayerView) -> Self {
        Self {
            player: view.player,
            money: view.money,
            queue: view.queue,
            queue_max: view.queue_max,
            dirty: view.dirty,
        }
    }
}

/// Response body for PUT /objects/:id
#[derive(Debug, Clone, Serialize)]
pub struct ObjectResponse {
    pub object: ObjectId,
    pub kind: ObjectKind,
    pub privileged: bool,
    /// Highest object index after registration
    pub db_top: ObjectId,
}

/// Response body for POST /admin/sync
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub players_written: usize,
}

/// Response body for PUT /admin/write-protect
#[derive(Debug, Clone, Serialize)]
pub struct WriteProtectResponse {
    pub write_protected: bool,
}

/// Response body for POST /admin/import
#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    pub loaded: u64,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub negative_hits: u64,
    pub misses: u64,
    pub store_hits: u64,
    pub evictions: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Current aggregate footprint in bytes
    pub footprint: usize,
    /// Fraction of lookups served from the cache
    pub hit_rate: f64,
    /// Current write mode
    pub mode: String,
    /// Players currently cached
    pub players: usize,
    pub opened_at: DateTime<Utc>,
}

impl StatsResponse {
    pub fn new(
        stats: &CacheStats,
        mode: &str,
        players: usize,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            hits: stats.hits,
            negative_hits: stats.negative_hits,
            misses: stats.misses,
            store_hits: stats.store_hits,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            footprint: stats.footprint,
            hit_rate: stats.hit_rate(),
            mode: mode.to_string(),
            players,
            opened_at,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_response_serialize() {
        let resp = AttrResponse::new(AttrKey::new(5, 10), b"hello");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""object":5"#));
        assert!(json.contains("hello"));
    }

    #[test]
    fn test_attr_write_response_message() {
        let resp = AttrWriteResponse::deleted(AttrKey::new(5, 10));
        assert_eq!(resp.message, "Attribute (5,10) deleted");
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let mut stats = CacheStats::new();
        for _ in 0..4 {
            stats.record_hit();
        }
        stats.record_miss(true);
        let resp = StatsResponse::new(&stats, "normal", 0, Utc::now());
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.mode, "normal");
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
