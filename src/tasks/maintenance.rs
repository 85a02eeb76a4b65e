//! Maintenance Task
//!
//! Background task driving the engine's periodic housekeeping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::Engine;

/// Spawns a background task that ticks the store and ages the player cache.
///
/// Every `tick_interval` the store gets its housekeeping call; every
/// `trim_interval` the player cache runs one aging sweep. Both take the
/// engine's write lock for the duration of the call only.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_maintenance_task(
    engine: Arc<RwLock<Engine>>,
    tick_interval: Duration,
    trim_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting maintenance task: tick every {:?}, player trim every {:?}",
            tick_interval, trim_interval
        );

        let mut tick = tokio::time::interval(tick_interval);
        let mut trim = tokio::time::interval(trim_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        trim.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately
        tick.tick().await;
        trim.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let result = engine.write().await.tick();
                    if let Err(e) = result {
                        warn!("Store tick failed: {}", e);
                    }
                }
                _ = trim.tick() => {
                    let removed = engine.write().await.trim_players();
                    if removed > 0 {
                        info!("Player trim: dropped {} idle players", removed);
                    } else {
                        debug!("Player trim: nothing to drop");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::objects::{ObjectInfo, ObjectKind};
    use crate::store::MemoryStore;

    fn test_engine() -> Arc<RwLock<Engine>> {
        let mut engine = Engine::open(Box::new(MemoryStore::new()), &Config::default());
        engine
            .register_object(
                1,
                ObjectInfo {
                    kind: ObjectKind::Player,
                    privileged: false,
                },
            )
            .unwrap();
        Arc::new(RwLock::new(engine))
    }

    #[tokio::test]
    async fn test_maintenance_ages_out_idle_players() {
        let engine = test_engine();
        engine.write().await.set_pennies(1, 5).unwrap();

        let handle = spawn_maintenance_task(
            engine.clone(),
            Duration::from_millis(20),
            Duration::from_millis(50),
        );

        // Two trims: one clears the reference flag, the second drops it
        tokio::time::sleep(Duration::from_millis(250)).await;

        {
            let guard = engine.read().await;
            assert!(guard.players().is_empty(), "Idle player should be aged out");
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_maintenance_keeps_players_with_queued_commands() {
        let engine = test_engine();
        engine.write().await.adjust_queue(1, 1);

        let handle = spawn_maintenance_task(
            engine.clone(),
            Duration::from_millis(20),
            Duration::from_millis(30),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        {
            let guard = engine.read().await;
            assert_eq!(guard.players().len(), 1);
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_maintenance_task_can_be_aborted() {
        let engine = test_engine();

        let handle = spawn_maintenance_task(
            engine,
            Duration::from_millis(10),
            Duration::from_millis(10),
        );

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
