//! Configuration Module
//!
//! Handles loading and managing engine configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Engine and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bound on the aggregate attribute-cache footprint, in bytes
    pub max_cache_size: usize,
    /// Maximum attribute payload length, in bytes
    pub max_record_len: usize,
    /// Number of bulk-load spool partitions (always a power of two)
    pub spool_partitions: usize,
    /// Directory holding spool partition files
    pub spool_dir: PathBuf,
    /// Global default limit on queued commands per player
    pub queue_max: i32,
    /// Append log of the persistent store
    pub store_log_path: PathBuf,
    /// Compacted snapshot of the persistent store
    pub store_snapshot_path: PathBuf,
    /// Store write buffer, in 4 KiB pages
    pub store_cache_pages: usize,
    /// Bypass the in-memory layers entirely (offline tools)
    pub standalone: bool,
    /// HTTP server port
    pub server_port: u16,
    /// Store housekeeping period in milliseconds
    pub tick_interval_ms: u64,
    /// Player-cache aging sweep period in seconds
    pub player_trim_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_CACHE_SIZE` - Attribute cache footprint bound (default: 1 MiB)
    /// - `MAX_RECORD_LEN` - Attribute payload limit (default: 8000)
    /// - `SPOOL_PARTITIONS` - Spool partition count (default: 8)
    /// - `SPOOL_DIR` - Spool directory (default: ".")
    /// - `QUEUE_MAX` - Default queued-command limit (default: 100)
    /// - `STORE_LOG_PATH` - Store log file (default: "attrs.log")
    /// - `STORE_SNAPSHOT_PATH` - Store snapshot file (default: "attrs.snap")
    /// - `STORE_CACHE_PAGES` - Store write buffer pages (default: 40)
    /// - `STANDALONE` - Disable in-memory caching (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `TICK_INTERVAL_MS` - Store housekeeping period (default: 1000)
    /// - `PLAYER_TRIM_INTERVAL` - Player aging period in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_cache_size: env_or("MAX_CACHE_SIZE", defaults.max_cache_size),
            max_record_len: env_or("MAX_RECORD_LEN", defaults.max_record_len).max(1),
            spool_partitions: normalize_partitions(env_or(
                "SPOOL_PARTITIONS",
                defaults.spool_partitions,
            )),
            spool_dir: env_or("SPOOL_DIR", defaults.spool_dir),
            queue_max: env_or("QUEUE_MAX", defaults.queue_max),
            store_log_path: env_or("STORE_LOG_PATH", defaults.store_log_path),
            store_snapshot_path: env_or("STORE_SNAPSHOT_PATH", defaults.store_snapshot_path),
            store_cache_pages: env_or("STORE_CACHE_PAGES", defaults.store_cache_pages),
            standalone: env_or("STANDALONE", defaults.standalone),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            tick_interval_ms: env_or("TICK_INTERVAL_MS", defaults.tick_interval_ms).max(1),
            player_trim_interval: env_or("PLAYER_TRIM_INTERVAL", defaults.player_trim_interval)
                .max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_cache_size: 1024 * 1024,
            max_record_len: 8000,
            spool_partitions: 8,
            spool_dir: PathBuf::from("."),
            queue_max: 100,
            store_log_path: PathBuf::from("attrs.log"),
            store_snapshot_path: PathBuf::from("attrs.snap"),
            store_cache_pages: 40,
            standalone: false,
            server_port: 3000,
            tick_interval_ms: 1000,
            player_trim_interval: 60,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Rounds a partition count up to a power of two in `1..=256`.
pub fn normalize_partitions(n: usize) -> usize {
    n.clamp(1, 256).next_power_of_two()
}
