//! Store management routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storefleet_core::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// Create store router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stores", get(list_stores).post(create_store))
        .route("/stores/{store_id}", get(get_store).delete(delete_store))
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct StoreListResponse {
    pub count: usize,
    pub stores: Vec<Store>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStoreResponse {
    pub store_id: String,
    pub status: String,
    pub deleted_at: Option<i64>,
}

/// Create a new store; provisioning continues in the background
pub async fn create_store(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStoreRequest>,
) -> Result<(StatusCode, Json<Store>), ApiError> {
    let store = state.orchestrator.create(&req.name).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

/// List stores that are not deleted
pub async fn list_stores(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StoreListResponse>, ApiError> {
    let stores = state.orchestrator.list()?;
    Ok(Json(StoreListResponse {
        count: stores.len(),
        stores,
    }))
}

/// Get a store by ID
pub async fn get_store(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<String>,
) -> Result<Json<Store>, ApiError> {
    Ok(Json(state.orchestrator.get(&store_id)?))
}

/// Tear down a store. Waits for the teardown, up to the delete timeout.
///
/// The teardown runs in its own task, so a timed-out request does not cut it
/// short.
pub async fn delete_store(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<String>,
) -> Result<Json<DeleteStoreResponse>, ApiError> {
    let teardown = {
        let state = Arc::clone(&state);
        let store_id = store_id.clone();
        tokio::spawn(async move { state.orchestrator.delete(&store_id).await })
    };

    let store = match tokio::time::timeout(state.delete_timeout, teardown).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_err)) => {
            return Err(ApiError::from(storefleet_core::Error::Other(format!(
                "Teardown task failed: {}",
                join_err
            ))))
        }
        Err(_) => {
            return Err(ApiError::Timeout(format!(
                "Teardown of store {} is still running",
                store_id
            )))
        }
    };

    Ok(Json(DeleteStoreResponse {
        store_id: store.store_id,
        status: store.status.to_string(),
        deleted_at: store.deleted_at,
    }))
}
