//! Inventory scan-session CRUD and confirmation.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, ProductDto, ScanItem, ScanItemResult, SessionDto};
use crate::db::{roles, states};
use crate::entities::scan_sessions;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub warehouse_id: Option<i32>,
    #[serde(default)]
    pub warehouse_name: Option<String>,
}

#[derive(Deserialize)]
pub struct AddProductsRequest {
    pub products: Vec<ScanItem>,
}

#[derive(Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionDto,
    pub products: Vec<ProductDto>,
}

#[derive(Serialize)]
pub struct AddProductsResponse {
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<ScanItemResult>,
}

/// Load a session the caller may see: their own, or any for leaders/admins.
async fn load_accessible(
    state: &AppState,
    user: &CurrentUser,
    id: i32,
) -> Result<scan_sessions::Model, ApiError> {
    let session = state
        .store()
        .get_scan_session(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load session: {e}")))?
        .ok_or_else(|| ApiError::not_found("Session", id))?;

    if session.user_id != user.id && !roles::is_leader(&user.role) {
        return Err(ApiError::Forbidden("Not your session".to_string()));
    }

    Ok(session)
}

/// GET /sessions
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<SessionDto>>>, ApiError> {
    let owner = if roles::is_leader(&user.role) {
        None
    } else {
        Some(user.id)
    };

    let sessions = state
        .store()
        .list_scan_sessions(owner, query.state.as_deref())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list sessions: {e}")))?;

    let ids: Vec<i32> = sessions.iter().map(|s| s.id).collect();
    let products = state
        .store()
        .products_for_sessions(&ids)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load session products: {e}")))?;

    let dtos = sessions
        .into_iter()
        .map(|session| {
            let own: Vec<_> = products
                .iter()
                .filter(|p| p.session_id == Some(session.id))
                .cloned()
                .collect();
            SessionDto::from_model(session, &own)
        })
        .collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// GET /sessions/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SessionDetail>>, ApiError> {
    let session = load_accessible(&state, &user, id).await?;

    let products = state
        .store()
        .products_for_session(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load products: {e}")))?;

    let dto = SessionDto::from_model(session, &products);

    Ok(Json(ApiResponse::success(SessionDetail {
        session: dto,
        products: products.into_iter().map(ProductDto::from).collect(),
    })))
}

/// PUT /sessions/{id}
/// Rename a session; warehouse reassignment is admin-only and silently
/// skipped for everyone else.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRequest>,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    let session = load_accessible(&state, &user, id).await?;

    if session.state == states::POSTED {
        return Err(ApiError::validation("Cannot edit a posted session"));
    }

    let warehouse = if roles::is_admin(&user.role) {
        payload
            .warehouse_id
            .map(|warehouse_id| (warehouse_id, payload.warehouse_name.clone()))
    } else {
        None
    };

    let updated = state
        .store()
        .update_scan_session_meta(id, payload.name.as_deref(), warehouse)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to update session: {e}")))?;

    let products = state
        .store()
        .products_for_session(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load products: {e}")))?;

    Ok(Json(ApiResponse::success(SessionDto::from_model(
        updated, &products,
    ))))
}

/// DELETE /sessions/{id}
/// Draft sessions only; owner or admin.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    let session = load_accessible(&state, &user, id).await?;

    if session.user_id != user.id && !roles::is_admin(&user.role) {
        return Err(ApiError::Forbidden("Not your session".to_string()));
    }

    if session.state != states::DRAFT {
        return Err(ApiError::validation("Only draft sessions can be deleted"));
    }

    let deleted = state
        .store()
        .delete_scan_session(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to delete session: {e}")))?;

    Ok(Json(ApiResponse::success(deleted)))
}

/// POST /sessions/{id}/products
/// Append scan lines to an existing session. Lines always belong to the
/// session's original owner, also when a leader or admin edits.
pub async fn add_products(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<AddProductsRequest>,
) -> Result<Json<ApiResponse<AddProductsResponse>>, ApiError> {
    let session = load_accessible(&state, &user, id).await?;

    if session.state == states::POSTED {
        return Err(ApiError::validation(
            "Cannot add products to a posted session",
        ));
    }

    if payload.products.is_empty() {
        return Err(ApiError::validation("Products array is required"));
    }

    let (results, success_count, failed_count) =
        super::scan::insert_items(&state, session.id, session.user_id, payload.products).await;

    Ok(Json(ApiResponse::success(AddProductsResponse {
        success_count,
        failed_count,
        results,
    })))
}

/// POST /sessions/{id}/confirm
/// Leader sign-off: moves a draft session and its draft lines to confirmed.
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    if !roles::is_leader(&user.role) {
        return Err(ApiError::Forbidden(
            "Only leaders can confirm sessions".to_string(),
        ));
    }

    let session = state
        .store()
        .get_scan_session(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load session: {e}")))?
        .ok_or_else(|| ApiError::not_found("Session", id))?;

    if session.state != states::DRAFT {
        return Err(ApiError::validation("Only draft sessions can be confirmed"));
    }

    state
        .store()
        .set_scan_session_state(id, states::CONFIRMED)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to confirm session: {e}")))?;

    state
        .store()
        .cascade_product_state(id, states::DRAFT, states::CONFIRMED)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to confirm products: {e}")))?;

    let confirmed = state
        .store()
        .get_scan_session(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to reload session: {e}")))?
        .ok_or_else(|| ApiError::not_found("Session", id))?;

    let products = state
        .store()
        .products_for_session(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load products: {e}")))?;

    Ok(Json(ApiResponse::success(SessionDto::from_model(
        confirmed, &products,
    ))))
}
