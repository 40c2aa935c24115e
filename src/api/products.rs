//! ERP lookups used by the scan form, plus the local unit table.

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::erp::handle_for;
use super::{ApiError, ApiResponse, AppState};
use crate::clients::odoo::{ErpLocation, ErpProduct, ErpWarehouse};
use crate::uom::Uom;

#[derive(Deserialize)]
pub struct BarcodeQuery {
    pub barcode: String,
}

/// GET /products/search?barcode=
/// Look the barcode up in the ERP through the caller's cached session.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<BarcodeQuery>,
) -> Result<Json<ApiResponse<ErpProduct>>, ApiError> {
    if query.barcode.is_empty() {
        return Err(ApiError::validation("Barcode parameter is required"));
    }

    let odoo = handle_for(&state, &user).await?;

    let product = odoo
        .product_by_barcode(&query.barcode)
        .await?
        .ok_or_else(|| ApiError::not_found("Product with barcode", &query.barcode))?;

    Ok(Json(ApiResponse::success(product)))
}

/// GET /uoms
pub async fn list_uoms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Uom>>>, ApiError> {
    let uoms = state
        .store()
        .list_uoms()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list units: {e}")))?;

    Ok(Json(ApiResponse::success(uoms)))
}

/// GET /warehouses
pub async fn warehouses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ErpWarehouse>>>, ApiError> {
    let odoo = handle_for(&state, &user).await?;
    let warehouses = odoo.warehouses().await?;
    Ok(Json(ApiResponse::success(warehouses)))
}

/// GET /locations
pub async fn locations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ErpLocation>>>, ApiError> {
    let odoo = handle_for(&state, &user).await?;
    let locations = odoo.inventory_locations().await?;
    Ok(Json(ApiResponse::success(locations)))
}
