//! Attr Cache - attribute and player caching over a persistent keyed store
//!
//! An LRU attribute cache bounded by byte footprint, a spooling bulk loader,
//! and a two-generation player accounting cache, with an admin HTTP surface.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod models;
pub mod objects;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use engine::Engine;
pub use tasks::spawn_maintenance_task;
