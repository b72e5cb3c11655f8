//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::backend::CacheBackend;
use crate::cache::Cache;
use crate::error::ApiError;
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HasResponse, HealthResponse, SetRequest,
    SetResponse, StatsResponse,
};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Application state shared across all handlers.
///
/// The engines synchronize internally, so the backend is shared without an
/// outer lock.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheBackend>,
}

impl AppState {
    /// Creates a new AppState around the given backend.
    pub fn new(cache: impl Into<CacheBackend>) -> Self {
        Self {
            cache: Arc::new(cache.into()),
        }
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> ApiResult<SetResponse> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl();
    state.cache.set(&req.key, req.value, ttl).await?;
    debug!("Stored key {:?} with {:?}", req.key, ttl);

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<GetResponse> {
    let value = state.cache.get(&key).await?;
    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<DeleteResponse> {
    state.cache.delete(&key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /has/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<HasResponse> {
    let exists = state.cache.has(&key).await?;
    Ok(Json(HasResponse::new(key, exists)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> ApiResult<ClearResponse> {
    state.cache.clear().await?;
    Ok(Json(ClearResponse::new(state.cache.name())))
}

/// Handler for GET /stats
///
/// Only the memory engine keeps local statistics.
pub async fn stats_handler(State(state): State<AppState>) -> ApiResult<StatsResponse> {
    let stats = state.cache.stats().ok_or_else(|| {
        ApiError::Unsupported(format!(
            "statistics are not tracked by the {} backend",
            state.cache.name()
        ))
    })?;
    Ok(Json(StatsResponse::from(stats)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.name()))
}
