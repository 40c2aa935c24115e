use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entities::verification_results;

#[derive(Debug, Clone)]
pub struct NewVerificationResult {
    pub odoo_line_id: i32,
    pub qty: f64,
    pub location_id: Option<i32>,
    pub location_name: Option<String>,
    pub verifier_id: Option<i32>,
    pub verifier_name: Option<String>,
    pub note: Option<String>,
    pub user_id: Option<i32>,
}

pub struct VerificationRepository {
    conn: DatabaseConnection,
}

impl VerificationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new: NewVerificationResult) -> Result<verification_results::Model> {
        let model = verification_results::ActiveModel {
            odoo_line_id: Set(new.odoo_line_id),
            qty: Set(new.qty),
            location_id: Set(new.location_id),
            location_name: Set(new.location_name),
            verifier_id: Set(new.verifier_id),
            verifier_name: Set(new.verifier_name),
            note: Set(new.note),
            user_id: Set(new.user_id),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let created = model
            .insert(&self.conn)
            .await
            .context("Failed to record verification entry")?;

        Ok(created)
    }

    pub async fn list_by_line(&self, odoo_line_id: i32) -> Result<Vec<verification_results::Model>> {
        let rows = verification_results::Entity::find()
            .filter(verification_results::Column::OdooLineId.eq(odoo_line_id))
            .order_by_desc(verification_results::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list verification entries")?;

        Ok(rows)
    }
}
