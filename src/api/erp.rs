//! Endpoints managing the caller's cached ERP session.

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState};
use crate::clients::odoo::OdooClient;
use crate::services::erp_session::ErpSessionInfo;

#[derive(Deserialize)]
pub struct EstablishRequest {
    pub password: String,
}

#[derive(Deserialize)]
pub struct ExtendRequest {
    #[serde(default = "default_extend_hours")]
    pub hours: i64,
}

const fn default_extend_hours() -> i64 {
    2
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub cleared: u64,
}

#[derive(Serialize)]
pub struct ExtendedResponse {
    pub extended: u64,
    pub info: Option<ErpSessionInfo>,
}

/// Fetch an authenticated ERP handle for the caller, reusing the cached
/// session. 401 with a re-prompt hint when no usable session exists.
pub async fn handle_for(state: &AppState, user: &CurrentUser) -> Result<OdooClient, ApiError> {
    state
        .erp_sessions()
        .get_handle(user.id, &user.email, None)
        .await?
        .ok_or_else(ApiError::no_erp_session)
}

/// POST /erp/session
/// Establish (or refresh) the caller's ERP session from a password.
pub async fn establish(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<EstablishRequest>,
) -> Result<Json<ApiResponse<ErpSessionInfo>>, ApiError> {
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    state
        .erp_sessions()
        .get_handle(user.id, &user.email, Some(&payload.password))
        .await?;

    let info = state
        .erp_sessions()
        .session_info(user.id)
        .await?
        .ok_or_else(|| ApiError::internal("Session was not persisted"))?;

    Ok(Json(ApiResponse::success(info)))
}

/// GET /erp/session
pub async fn info(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Option<ErpSessionInfo>>>, ApiError> {
    let info = state.erp_sessions().session_info(user.id).await?;
    Ok(Json(ApiResponse::success(info)))
}

/// PUT /erp/session
/// Push out the expiry of the caller's active ERP session.
pub async fn extend(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ExtendRequest>,
) -> Result<Json<ApiResponse<ExtendedResponse>>, ApiError> {
    if payload.hours <= 0 {
        return Err(ApiError::validation("hours must be positive"));
    }

    let extended = state.erp_sessions().extend(user.id, payload.hours).await?;
    let info = state.erp_sessions().session_info(user.id).await?;

    Ok(Json(ApiResponse::success(ExtendedResponse {
        extended,
        info,
    })))
}

/// DELETE /erp/session
pub async fn clear(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<ClearedResponse>>, ApiError> {
    let cleared = state.erp_sessions().clear_all(user.id).await?;
    Ok(Json(ApiResponse::success(ClearedResponse { cleared })))
}
