use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;

use super::states;
use crate::entities::{products, scan_sessions, users};

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub product_id: Option<i32>,
    pub barcode: String,
    pub name: Option<String>,
    pub quantity: f64,
    pub uom_id: Option<i32>,
    pub uom_name: Option<String>,
    pub location_id: Option<i32>,
    pub location_name: Option<String>,
    pub session_id: i32,
    pub user_id: i32,
}

/// A scan line joined with the names around it, for exports and history.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProductRow {
    pub id: i32,
    pub product_id: Option<i32>,
    pub barcode: String,
    pub name: Option<String>,
    pub quantity: f64,
    pub uom_name: Option<String>,
    pub location_name: Option<String>,
    pub state: String,
    pub session_name: Option<String>,
    pub scanned_by: Option<String>,
    pub created_at: String,
}

pub struct ProductRepository {
    conn: DatabaseConnection,
}

impl ProductRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new: NewProduct) -> Result<products::Model> {
        let model = products::ActiveModel {
            product_id: Set(new.product_id),
            barcode: Set(new.barcode),
            name: Set(new.name),
            quantity: Set(new.quantity),
            uom_id: Set(new.uom_id),
            uom_name: Set(new.uom_name),
            location_id: Set(new.location_id),
            location_name: Set(new.location_name),
            state: Set(states::DRAFT.to_string()),
            session_id: Set(Some(new.session_id)),
            user_id: Set(Some(new.user_id)),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let created = model
            .insert(&self.conn)
            .await
            .context("Failed to create product line")?;

        Ok(created)
    }

    pub async fn list_by_session(&self, session_id: i32) -> Result<Vec<products::Model>> {
        let rows = products::Entity::find()
            .filter(products::Column::SessionId.eq(session_id))
            .order_by_desc(products::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list products for session")?;

        Ok(rows)
    }

    pub async fn list_by_sessions(&self, session_ids: &[i32]) -> Result<Vec<products::Model>> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = products::Entity::find()
            .filter(products::Column::SessionId.is_in(session_ids.to_vec()))
            .all(&self.conn)
            .await
            .context("Failed to list products for sessions")?;

        Ok(rows)
    }

    pub async fn list_by_document(&self, document_id: i32) -> Result<Vec<products::Model>> {
        let rows = products::Entity::find()
            .filter(products::Column::DocumentId.eq(document_id))
            .order_by_asc(products::Column::Barcode)
            .all(&self.conn)
            .await
            .context("Failed to list products for document")?;

        Ok(rows)
    }

    /// All lines with their session and scanner names, newest first.
    pub async fn export_rows(&self) -> Result<Vec<ProductRow>> {
        let rows = products::Entity::find()
            .order_by_desc(products::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list products for export")?;

        self.with_context_names(rows).await
    }

    /// Recent scans of one barcode with scanner and session names, for the
    /// verification detail view.
    pub async fn recent_by_barcode(&self, barcode: &str, limit: u64) -> Result<Vec<ProductRow>> {
        let rows = products::Entity::find()
            .filter(products::Column::Barcode.eq(barcode))
            .order_by_desc(products::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query scan history by barcode")?;

        self.with_context_names(rows).await
    }

    async fn with_context_names(&self, rows: Vec<products::Model>) -> Result<Vec<ProductRow>> {
        let session_ids: Vec<i32> = rows.iter().filter_map(|p| p.session_id).collect();
        let user_ids: Vec<i32> = rows.iter().filter_map(|p| p.user_id).collect();

        let sessions: HashMap<i32, String> = if session_ids.is_empty() {
            HashMap::new()
        } else {
            scan_sessions::Entity::find()
                .filter(scan_sessions::Column::Id.is_in(session_ids))
                .all(&self.conn)
                .await
                .context("Failed to load sessions for product rows")?
                .into_iter()
                .map(|s| (s.id, s.name))
                .collect()
        };

        let user_names: HashMap<i32, String> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(user_ids))
                .all(&self.conn)
                .await
                .context("Failed to load users for product rows")?
                .into_iter()
                .map(|u| (u.id, u.name))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|p| ProductRow {
                session_name: p.session_id.and_then(|id| sessions.get(&id).cloned()),
                scanned_by: p.user_id.and_then(|id| user_names.get(&id).cloned()),
                id: p.id,
                product_id: p.product_id,
                barcode: p.barcode,
                name: p.name,
                quantity: p.quantity,
                uom_name: p.uom_name,
                location_name: p.location_name,
                state: p.state,
                created_at: p.created_at,
            })
            .collect())
    }

    /// Confirmed-but-unposted lines paired with their sessions, the input to
    /// reconciliation.
    pub async fn confirmed_with_sessions(
        &self,
    ) -> Result<Vec<(products::Model, Option<scan_sessions::Model>)>> {
        let rows = products::Entity::find()
            .filter(products::Column::State.eq(states::CONFIRMED))
            .find_also_related(scan_sessions::Entity)
            .all(&self.conn)
            .await
            .context("Failed to query confirmed products")?;

        Ok(rows)
    }

    pub async fn mark_posted(&self, ids: &[i32], document_id: i32) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = products::Entity::update_many()
            .col_expr(
                products::Column::State,
                sea_orm::sea_query::Expr::value(states::POSTED),
            )
            .col_expr(
                products::Column::DocumentId,
                sea_orm::sea_query::Expr::value(document_id),
            )
            .filter(products::Column::Id.is_in(ids.to_vec()))
            .exec(&self.conn)
            .await
            .context("Failed to mark products posted")?;

        Ok(result.rows_affected)
    }

    /// Cascade a session's lines from one state to the next (confirm moves
    /// draft lines to confirmed).
    pub async fn set_state_for_session(
        &self,
        session_id: i32,
        from_state: &str,
        to_state: &str,
    ) -> Result<u64> {
        let result = products::Entity::update_many()
            .col_expr(
                products::Column::State,
                sea_orm::sea_query::Expr::value(to_state),
            )
            .filter(products::Column::SessionId.eq(session_id))
            .filter(products::Column::State.eq(from_state))
            .exec(&self.conn)
            .await
            .context("Failed to cascade product state")?;

        Ok(result.rows_affected)
    }

    pub async fn has_unposted_in_session(&self, session_id: i32) -> Result<bool> {
        let count = products::Entity::find()
            .filter(products::Column::SessionId.eq(session_id))
            .filter(products::Column::State.ne(states::POSTED))
            .count(&self.conn)
            .await
            .context("Failed to count unposted products in session")?;

        Ok(count > 0)
    }

    pub async fn count_by_state(&self, state: &str) -> Result<u64> {
        let count = products::Entity::find()
            .filter(products::Column::State.eq(state))
            .count(&self.conn)
            .await
            .context("Failed to count products")?;

        Ok(count)
    }

    /// Scan-line counts per user, for the statistics view.
    pub async fn per_user_totals(&self) -> Result<Vec<(Option<i32>, i64)>> {
        let rows: Vec<(Option<i32>, i64)> = products::Entity::find()
            .select_only()
            .column(products::Column::UserId)
            .column_as(products::Column::Id.count(), "count")
            .group_by(products::Column::UserId)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to aggregate per-user scan totals")?;

        Ok(rows)
    }
}
