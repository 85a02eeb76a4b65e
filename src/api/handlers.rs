//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{AttrKey, AttrNum, ObjectId};
use crate::engine::Engine;
use crate::error::{CacheError, Result};
use crate::models::{
    AttrResponse, AttrWriteResponse, HealthResponse, ImportRequest, ImportResponse,
    ObjectResponse, PlayerResponse, PutAttrRequest, RegisterObjectRequest, SetMoneyRequest,
    StatsResponse, SyncResponse, WriteProtectRequest, WriteProtectResponse,
};
use crate::objects::{ObjectInfo, ObjectModel};

/// Application state shared across all handlers.
///
/// The engine is single-writer; every handler that can touch recency or
/// player state takes the write lock.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<Engine>>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
        }
    }
}

/// Handler for GET /attr/:object/:attr
pub async fn get_attr_handler(
    State(state): State<AppState>,
    Path((object, attr)): Path<(ObjectId, AttrNum)>,
) -> Result<Json<AttrResponse>> {
    let key = AttrKey::new(object, attr);
    // Write lock: a read promotes the entry and may cache a miss
    let mut engine = state.engine.write().await;
    let value = engine
        .attrs_mut()
        .get(key)
        .ok_or_else(|| CacheError::NotFound(format!("attribute {}", key)))?;

    Ok(Json(AttrResponse::new(key, &value)))
}

/// Handler for PUT /attr
pub async fn put_attr_handler(
    State(state): State<AppState>,
    Json(req): Json<PutAttrRequest>,
) -> Result<Json<AttrWriteResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let key = req.key();
    let mut engine = state.engine.write().await;
    engine.attrs_mut().put(key, req.value.as_bytes())?;

    Ok(Json(AttrWriteResponse::stored(key)))
}

/// Handler for DELETE /attr/:object/:attr
pub async fn delete_attr_handler(
    State(state): State<AppState>,
    Path((object, attr)): Path<(ObjectId, AttrNum)>,
) -> Result<Json<AttrWriteResponse>> {
    let key = AttrKey::new(object, attr);
    let mut engine = state.engine.write().await;
    engine.attrs_mut().del(key)?;

    Ok(Json(AttrWriteResponse::deleted(key)))
}

fn player_response(engine: &mut Engine, player: ObjectId) -> Result<PlayerResponse> {
    if let Some(view) = engine.player(player) {
        return Ok(view.into());
    }
    if !engine.objects().is_valid(player) {
        return Err(CacheError::NotFound(format!("object {}", player)));
    }
    // Not cached: standalone mode or not a player
    Ok(PlayerResponse {
        player,
        money: engine.pennies(player),
        queue: 0,
        queue_max: engine.queue_max(player),
        dirty: false,
    })
}

/// Handler for GET /player/:id
pub async fn get_player_handler(
    State(state): State<AppState>,
    Path(player): Path<ObjectId>,
) -> Result<Json<PlayerResponse>> {
    let mut engine = state.engine.write().await;
    player_response(&mut engine, player).map(Json)
}

/// Handler for PUT /player/:id/money
pub async fn set_money_handler(
    State(state): State<AppState>,
    Path(player): Path<ObjectId>,
    Json(req): Json<SetMoneyRequest>,
) -> Result<Json<PlayerResponse>> {
    let mut engine = state.engine.write().await;
    if !engine.objects().is_valid(player) {
        return Err(CacheError::NotFound(format!("object {}", player)));
    }
    engine.set_pennies(player, req.money)?;
    player_response(&mut engine, player).map(Json)
}

/// Handler for PUT /objects/:id
pub async fn register_object_handler(
    State(state): State<AppState>,
    Path(object): Path<ObjectId>,
    Json(req): Json<RegisterObjectRequest>,
) -> Result<Json<ObjectResponse>> {
    let info = ObjectInfo::from(req);
    let mut engine = state.engine.write().await;
    if !engine.register_object(object, info)? {
        return Err(CacheError::InvalidRequest(format!(
            "object id {} is negative",
            object
        )));
    }

    Ok(Json(ObjectResponse {
        object,
        kind: info.kind,
        privileged: info.privileged,
        db_top: engine.objects().db_top(),
    }))
}

/// Handler for POST /admin/sync
///
/// Writes back player accounting, then syncs the store.
pub async fn sync_handler(State(state): State<AppState>) -> Result<Json<SyncResponse>> {
    let mut engine = state.engine.write().await;
    let players_written = engine.sync_all()?;
    Ok(Json(SyncResponse { players_written }))
}

/// Handler for PUT /admin/write-protect
pub async fn write_protect_handler(
    State(state): State<AppState>,
    Json(req): Json<WriteProtectRequest>,
) -> Result<Json<WriteProtectResponse>> {
    let mut engine = state.engine.write().await;
    engine.attrs_mut().set_write_protected(req.enabled)?;
    Ok(Json(WriteProtectResponse {
        write_protected: engine.attrs().is_write_protected(),
    }))
}

/// Handler for POST /admin/import
///
/// Loads a batch of attribute writes through the bulk spool.
pub async fn import_handler(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>> {
    let mut engine = state.engine.write().await;
    let loaded = engine.bulk_import(req.into_writes())?;
    Ok(Json(ImportResponse { loaded }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let engine = state.engine.read().await;
    let attrs = engine.attrs();

    Json(StatsResponse::new(
        &attrs.stats(),
        attrs.mode().name(),
        engine.players().len(),
        attrs.opened_at(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
