use serde::{Deserialize, Serialize};

use crate::entities::{documents, products, scan_sessions};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub id: i32,
    pub name: String,
    pub user_id: i32,
    pub warehouse_id: Option<i32>,
    pub warehouse_name: Option<String>,
    pub state: String,
    pub product_count: usize,
    pub total_quantity: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionDto {
    #[must_use]
    pub fn from_model(session: scan_sessions::Model, products: &[products::Model]) -> Self {
        Self {
            id: session.id,
            name: session.name,
            user_id: session.user_id,
            warehouse_id: session.warehouse_id,
            warehouse_name: session.warehouse_name,
            state: session.state,
            product_count: products.len(),
            total_quantity: products.iter().map(|p| p.quantity).sum(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDto {
    pub id: i32,
    pub product_id: Option<i32>,
    pub barcode: String,
    pub name: Option<String>,
    pub quantity: f64,
    pub uom_id: Option<i32>,
    pub uom_name: Option<String>,
    pub location_id: Option<i32>,
    pub location_name: Option<String>,
    pub state: String,
    pub session_id: Option<i32>,
    pub created_at: String,
}

impl From<products::Model> for ProductDto {
    fn from(p: products::Model) -> Self {
        Self {
            id: p.id,
            product_id: p.product_id,
            barcode: p.barcode,
            name: p.name,
            quantity: p.quantity,
            uom_id: p.uom_id,
            uom_name: p.uom_name,
            location_id: p.location_id,
            location_name: p.location_name,
            state: p.state,
            session_id: p.session_id,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentDto {
    pub id: i32,
    pub name: String,
    pub inventory_id: Option<i32>,
    pub state: String,
    pub user_id: Option<i32>,
    pub created_at: String,
}

impl From<documents::Model> for DocumentDto {
    fn from(d: documents::Model) -> Self {
        Self {
            id: d.id,
            name: d.name,
            inventory_id: d.inventory_id,
            state: d.state,
            user_id: d.user_id,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateCounts {
    pub draft: u64,
    pub confirmed: u64,
    pub posted: u64,
}

#[derive(Debug, Serialize)]
pub struct UserScanTotal {
    pub user_id: Option<i32>,
    pub name: Option<String>,
    pub lines: i64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsDto {
    pub sessions: StateCounts,
    pub products: StateCounts,
    pub per_user: Vec<UserScanTotal>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub database_ok: bool,
    pub users: u64,
    pub draft_sessions: u64,
    pub confirmed_products: u64,
}

#[derive(Debug, Deserialize)]
pub struct ScanItem {
    pub barcode: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub product_id: Option<i32>,
    #[serde(default)]
    pub uom_id: Option<i32>,
    #[serde(default)]
    pub uom_name: Option<String>,
    #[serde(default)]
    pub location_id: Option<i32>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ScanItemResult {
    pub barcode: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub session_id: i32,
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<ScanItemResult>,
}
