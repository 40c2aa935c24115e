//! Excel downloads.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

use super::{ApiError, AppState};

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// GET /export/excel
/// Workbook of every scan line.
pub async fn excel(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let buffer = state
        .export()
        .all_products()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to build export: {e}")))?;

    let filename = format!(
        "products_{}.xlsx",
        chrono::Utc::now().format("%Y-%m-%d")
    );

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        buffer,
    ))
}

/// GET /admin/documents/{id}/download
pub async fn document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, buffer) = state
        .export()
        .document(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to build export: {e}")))?
        .ok_or_else(|| ApiError::not_found("Document", id))?;

    let filename = format!("{}.xlsx", name.replace(['/', '\\'], "-"));

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        buffer,
    ))
}
