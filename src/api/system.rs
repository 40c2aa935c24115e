//! System status and externally triggered maintenance.

use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, SystemStatus};
use crate::db::states;
use crate::services::erp_session::MaintenanceReport;

/// GET /system/status
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    let store = state.store();
    let database_ok = store.ping().await.is_ok();

    Ok(Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        database_ok,
        users: store.count_users().await?,
        draft_sessions: store.count_scan_sessions_by_state(states::DRAFT).await?,
        confirmed_products: store.count_products_by_state(states::CONFIRMED).await?,
    })))
}

/// POST /system/maintenance/purge-sessions
/// The ERP-session sweep: retire expired records, delete inactive ones.
/// Invoked by an external scheduler (or an admin), never self-starting.
pub async fn purge_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<MaintenanceReport>>, ApiError> {
    let report = state.erp_sessions().run_maintenance().await?;
    Ok(Json(ApiResponse::success(report)))
}
