//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use storefleet_core::db::StoreStatusCounts;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub components: HealthComponents,
    pub stores: StoreStatusCounts,
}

#[derive(Serialize)]
pub struct HealthComponents {
    pub database: bool,
    pub reconciler: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let db_healthy = state.db.ping().is_ok();
    let reconciler_running = state.orchestrator.is_reconciling();

    let stores = state.db.count_by_status().unwrap_or_default();

    let status = if db_healthy && reconciler_running {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        service: "storefleet-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: HealthComponents {
            database: db_healthy,
            reconciler: reconciler_running,
        },
        stores,
    })
}
