//! Admin reconciliation and verification endpoints. All routes here sit
//! behind the admin role guard.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::erp::handle_for;
use super::{
    ApiError, ApiResponse, AppState, DocumentDto, StateCounts, StatisticsDto, UserScanTotal,
};
use crate::clients::odoo::{ErpUser, VerificationFilter};
use crate::db::{NewVerificationResult, ProductRow, UomSync, states};
use crate::services::reconcile::{PostReport, UnpostedGroup};

// ============================================================================
// Reconciliation
// ============================================================================

/// GET /admin/unposted
pub async fn unposted(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UnpostedGroup>>>, ApiError> {
    let groups = state
        .reconcile()
        .unposted()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to group unposted lines: {e}")))?;

    Ok(Json(ApiResponse::success(groups)))
}

/// POST /admin/unposted/post
/// Push all unposted groups to the ERP as bulk inventory adjustments.
pub async fn post_unposted(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<PostReport>>, ApiError> {
    let odoo = handle_for(&state, &user).await?;

    let report = state
        .reconcile()
        .post(&odoo, user.id)
        .await
        .map_err(|e| match e {
            crate::services::reconcile::ReconcileError::Erp(e) => ApiError::from(e),
            crate::services::reconcile::ReconcileError::Storage(e) => {
                ApiError::DatabaseError(e.to_string())
            }
        })?;

    Ok(Json(ApiResponse::success(report)))
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Serialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentDto>,
    /// State of the matching inventory documents in the ERP.
    pub erp: Value,
}

/// GET /admin/documents
/// Local documents merged with the ERP's view of the same inventories.
pub async fn documents(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<DocumentsResponse>>, ApiError> {
    let documents = state
        .store()
        .list_documents()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list documents: {e}")))?;

    let inventory_ids: Vec<i64> = documents
        .iter()
        .filter_map(|d| d.inventory_id)
        .map(i64::from)
        .collect();

    let erp = if inventory_ids.is_empty() {
        Value::Array(Vec::new())
    } else {
        let odoo = handle_for(&state, &user).await?;
        odoo.inventories_by_ids(&inventory_ids).await?
    };

    Ok(Json(ApiResponse::success(DocumentsResponse {
        documents: documents.into_iter().map(DocumentDto::from).collect(),
        erp,
    })))
}

// ============================================================================
// Verification
// ============================================================================

#[derive(Deserialize)]
pub struct VerificationQuery {
    #[serde(default)]
    pub inventory_id: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// GET /admin/verification
pub async fn verification_lines(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<VerificationQuery>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let odoo = handle_for(&state, &user).await?;

    let filter = VerificationFilter {
        inventory_id: query.inventory_id,
        search: query.search,
        status: query.status,
        limit: query.limit,
        offset: query.offset,
    };

    let lines = odoo.verification_lines(&filter).await?;
    Ok(Json(ApiResponse::success(lines)))
}

#[derive(Serialize)]
pub struct VerificationDetail {
    /// The ERP's view of the line.
    pub line: Value,
    /// Locally recorded verification entries for it.
    pub entries: Vec<VerificationEntryDto>,
    /// Recent scans of the same barcode, for cross-checking.
    pub previous_scans: Vec<ProductRow>,
}

#[derive(Serialize)]
pub struct VerificationEntryDto {
    pub id: i32,
    pub odoo_line_id: i32,
    pub qty: f64,
    pub location_id: Option<i32>,
    pub location_name: Option<String>,
    pub verifier_id: Option<i32>,
    pub verifier_name: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

/// GET /admin/verification/{line_id}
pub async fn verification_detail(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(line_id): Path<i64>,
) -> Result<Json<ApiResponse<VerificationDetail>>, ApiError> {
    let odoo = handle_for(&state, &user).await?;

    let line = odoo
        .verification_line_detail(line_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Verification line", line_id))?;

    let entries = state
        .store()
        .verification_entries_for_line(line_id as i32)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load entries: {e}")))?;

    let previous_scans = match line["barcode"].as_str() {
        Some(barcode) => state
            .store()
            .recent_scans_by_barcode(barcode, 20)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to load scan history: {e}")))?,
        None => Vec::new(),
    };

    Ok(Json(ApiResponse::success(VerificationDetail {
        line,
        entries: entries
            .into_iter()
            .map(|e| VerificationEntryDto {
                id: e.id,
                odoo_line_id: e.odoo_line_id,
                qty: e.qty,
                location_id: e.location_id,
                location_name: e.location_name,
                verifier_id: e.verifier_id,
                verifier_name: e.verifier_name,
                note: e.note,
                created_at: e.created_at,
            })
            .collect(),
        previous_scans,
    })))
}

#[derive(Deserialize)]
pub struct AddEntryRequest {
    pub qty: f64,
    pub location_id: i64,
    #[serde(default)]
    pub location_name: Option<String>,
    pub verifier_id: i64,
    #[serde(default)]
    pub verifier_name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// POST /admin/verification/{line_id}/entries
/// The ERP write happens first: it assigns the verification id, so a local
/// failure afterwards must not lose track of it.
pub async fn add_verification_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(line_id): Path<i64>,
    Json(payload): Json<AddEntryRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let odoo = handle_for(&state, &user).await?;

    let erp_result = odoo
        .add_verification_qty(
            line_id,
            payload.qty,
            payload.location_id,
            payload.verifier_id,
            payload.note.as_deref(),
        )
        .await?;

    state
        .store()
        .record_verification_entry(NewVerificationResult {
            odoo_line_id: line_id as i32,
            qty: payload.qty,
            location_id: Some(payload.location_id as i32),
            location_name: payload.location_name,
            verifier_id: Some(payload.verifier_id as i32),
            verifier_name: payload.verifier_name,
            note: payload.note,
            user_id: Some(user.id),
        })
        .await
        .map_err(|e| {
            tracing::error!(
                line_id,
                erp_result = %erp_result,
                "ERP accepted verification entry but local record failed: {e}"
            );
            ApiError::internal("Verification saved in ERP but local record failed")
        })?;

    Ok(Json(ApiResponse::success(erp_result)))
}

/// GET /admin/verifiers
pub async fn verifiers(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ErpUser>>>, ApiError> {
    let odoo = handle_for(&state, &user).await?;
    let users = odoo.verifier_candidates().await?;
    Ok(Json(ApiResponse::success(users)))
}

// ============================================================================
// Unit sync & statistics
// ============================================================================

#[derive(Serialize)]
pub struct UomSyncResponse {
    pub synced: usize,
}

/// POST /admin/uoms/sync
/// Pull the ERP's unit-of-measure table into the local mirror.
pub async fn sync_uoms(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UomSyncResponse>>, ApiError> {
    let odoo = handle_for(&state, &user).await?;
    let units = odoo.uoms().await?;

    let sync: Vec<UomSync> = units
        .into_iter()
        .filter_map(|u| {
            u.category_id.map(|category| UomSync {
                id: u.id as i32,
                name: u.name,
                category_id: category.id as i32,
                uom_type: u.uom_type,
                factor: u.factor,
                factor_inv: u.factor_inv,
            })
        })
        .collect();

    let synced = state
        .store()
        .upsert_uoms(sync)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to upsert units: {e}")))?;

    Ok(Json(ApiResponse::success(UomSyncResponse { synced })))
}

/// GET /admin/statistics
pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatisticsDto>>, ApiError> {
    let store = state.store();

    let sessions = StateCounts {
        draft: store.count_scan_sessions_by_state(states::DRAFT).await?,
        confirmed: store
            .count_scan_sessions_by_state(states::CONFIRMED)
            .await?,
        posted: store.count_scan_sessions_by_state(states::POSTED).await?,
    };

    let products = StateCounts {
        draft: store.count_products_by_state(states::DRAFT).await?,
        confirmed: store.count_products_by_state(states::CONFIRMED).await?,
        posted: store.count_products_by_state(states::POSTED).await?,
    };

    let mut per_user = Vec::new();
    for (user_id, lines) in store.per_user_scan_totals().await? {
        let name = match user_id {
            Some(id) => store.get_user_by_id(id).await?.map(|u| u.name),
            None => None,
        };
        per_user.push(UserScanTotal {
            user_id,
            name,
            lines,
        });
    }

    Ok(Json(ApiResponse::success(StatisticsDto {
        sessions,
        products,
        per_user,
    })))
}
