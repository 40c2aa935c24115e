//! Barcode-scan batch submission.

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, ProductDto, ScanItem, ScanItemResult, ScanResponse};
use crate::db::NewProduct;

#[derive(Deserialize)]
pub struct ScanRequest {
    pub products: Vec<ScanItem>,
    #[serde(default)]
    pub session_name: Option<String>,
}

/// POST /scan
/// Create a scan session and one product line per scanned item. A failing
/// item is reported but does not abort the rest of the batch.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ApiResponse<ScanResponse>>, ApiError> {
    if payload.products.is_empty() {
        return Err(ApiError::validation("Products array is required"));
    }

    let name = payload
        .session_name
        .unwrap_or_else(|| format!("Session {}", chrono::Utc::now().to_rfc3339()));

    let session = state
        .store()
        .create_scan_session(user.id, &name)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create scan session: {e}")))?;

    let (results, success_count, failed_count) =
        insert_items(&state, session.id, user.id, payload.products).await;

    Ok(Json(ApiResponse::success(ScanResponse {
        session_id: session.id,
        success_count,
        failed_count,
        results,
    })))
}

/// Insert scan items into a session, collecting per-item outcomes.
pub(super) async fn insert_items(
    state: &AppState,
    session_id: i32,
    owner_id: i32,
    items: Vec<ScanItem>,
) -> (Vec<ScanItemResult>, usize, usize) {
    let mut results = Vec::with_capacity(items.len());
    let mut success_count = 0;
    let mut failed_count = 0;

    for item in items {
        if item.barcode.is_empty() {
            failed_count += 1;
            results.push(ScanItemResult {
                barcode: item.barcode,
                success: false,
                product: None,
                error: Some("Barcode is required".to_string()),
            });
            continue;
        }

        let new = NewProduct {
            product_id: item.product_id,
            barcode: item.barcode.clone(),
            name: item.name,
            quantity: item.quantity.unwrap_or(1.0),
            uom_id: item.uom_id,
            uom_name: item.uom_name,
            location_id: item.location_id,
            location_name: item.location_name,
            session_id,
            user_id: owner_id,
        };

        match state.store().create_product(new).await {
            Ok(product) => {
                success_count += 1;
                results.push(ScanItemResult {
                    barcode: item.barcode,
                    success: true,
                    product: Some(ProductDto::from(product)),
                    error: None,
                });
            }
            Err(e) => {
                warn!(barcode = %item.barcode, error = %e, "Failed to store scan line");
                failed_count += 1;
                results.push(ScanItemResult {
                    barcode: item.barcode,
                    success: false,
                    product: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    (results, success_count, failed_count)
}
