//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Maintenance: store housekeeping on every tick, player-cache aging on
//!   a slower period

mod maintenance;

pub use maintenance::spawn_maintenance_task;
