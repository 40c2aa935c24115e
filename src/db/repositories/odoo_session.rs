use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::crypto::EncryptedCredentials;
use crate::entities::odoo_sessions;

pub struct OdooSessionRepository {
    conn: DatabaseConnection,
}

impl OdooSessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// The user's current active, unexpired session record, newest first.
    pub async fn find_active(&self, user_id: i32) -> Result<Option<odoo_sessions::Model>> {
        let now = chrono::Utc::now().to_rfc3339();

        let record = odoo_sessions::Entity::find()
            .filter(odoo_sessions::Column::UserId.eq(user_id))
            .filter(odoo_sessions::Column::IsActive.eq(true))
            .filter(odoo_sessions::Column::ExpiresAt.gt(now))
            .order_by_desc(odoo_sessions::Column::CreatedAt)
            .one(&self.conn)
            .await
            .context("Failed to query active ERP session")?;

        Ok(record)
    }

    /// Persist a freshly established session. Any previous active record for
    /// the user is deactivated in the same transaction, which together with
    /// the partial unique index keeps at most one active row per user.
    pub async fn create_active(
        &self,
        user_id: i32,
        email: &str,
        blob: &EncryptedCredentials,
        expires_at: &str,
    ) -> Result<odoo_sessions::Model> {
        let now = chrono::Utc::now().to_rfc3339();
        let email = email.to_string();
        let blob = blob.clone();
        let expires_at = expires_at.to_string();

        let created = self
            .conn
            .transaction::<_, odoo_sessions::Model, sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    odoo_sessions::Entity::update_many()
                        .col_expr(odoo_sessions::Column::IsActive, Expr::value(false))
                        .col_expr(odoo_sessions::Column::UpdatedAt, Expr::value(now.clone()))
                        .filter(odoo_sessions::Column::UserId.eq(user_id))
                        .filter(odoo_sessions::Column::IsActive.eq(true))
                        .exec(txn)
                        .await?;

                    let model = odoo_sessions::ActiveModel {
                        user_id: Set(user_id),
                        email: Set(email),
                        cipher_text: Set(blob.cipher_text),
                        nonce: Set(blob.nonce),
                        auth_tag: Set(blob.auth_tag),
                        key_id: Set(blob.key_id),
                        is_active: Set(true),
                        expires_at: Set(expires_at),
                        created_at: Set(now.clone()),
                        updated_at: Set(now),
                        ..Default::default()
                    };

                    model.insert(txn).await
                })
            })
            .await
            .context("Failed to persist ERP session")?;

        Ok(created)
    }

    /// Mark one record inactive. Idempotent: invalidating an already
    /// inactive or missing record is a no-op.
    pub async fn invalidate(&self, session_id: i32) -> Result<()> {
        odoo_sessions::Entity::update_many()
            .col_expr(odoo_sessions::Column::IsActive, Expr::value(false))
            .col_expr(
                odoo_sessions::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(odoo_sessions::Column::Id.eq(session_id))
            .exec(&self.conn)
            .await
            .context("Failed to invalidate ERP session")?;

        Ok(())
    }

    /// Mark all of a user's active records inactive, returning how many were
    /// affected.
    pub async fn clear_all(&self, user_id: i32) -> Result<u64> {
        let result = odoo_sessions::Entity::update_many()
            .col_expr(odoo_sessions::Column::IsActive, Expr::value(false))
            .col_expr(
                odoo_sessions::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(odoo_sessions::Column::UserId.eq(user_id))
            .filter(odoo_sessions::Column::IsActive.eq(true))
            .exec(&self.conn)
            .await
            .context("Failed to clear ERP sessions")?;

        Ok(result.rows_affected)
    }

    /// Retire active records whose expiry has passed.
    pub async fn deactivate_expired(&self) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = odoo_sessions::Entity::update_many()
            .col_expr(odoo_sessions::Column::IsActive, Expr::value(false))
            .col_expr(odoo_sessions::Column::UpdatedAt, Expr::value(now.clone()))
            .filter(odoo_sessions::Column::IsActive.eq(true))
            .filter(odoo_sessions::Column::ExpiresAt.lte(now))
            .exec(&self.conn)
            .await
            .context("Failed to deactivate expired ERP sessions")?;

        Ok(result.rows_affected)
    }

    /// Delete inactive records. Active records are never touched.
    pub async fn purge_inactive(&self) -> Result<u64> {
        let result = odoo_sessions::Entity::delete_many()
            .filter(odoo_sessions::Column::IsActive.eq(false))
            .exec(&self.conn)
            .await
            .context("Failed to purge inactive ERP sessions")?;

        Ok(result.rows_affected)
    }

    /// Push out the expiry of the user's active, unexpired records.
    pub async fn extend(&self, user_id: i32, new_expires_at: &str) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = odoo_sessions::Entity::update_many()
            .col_expr(
                odoo_sessions::Column::ExpiresAt,
                Expr::value(new_expires_at),
            )
            .col_expr(odoo_sessions::Column::UpdatedAt, Expr::value(now.clone()))
            .filter(odoo_sessions::Column::UserId.eq(user_id))
            .filter(odoo_sessions::Column::IsActive.eq(true))
            .filter(odoo_sessions::Column::ExpiresAt.gt(now))
            .exec(&self.conn)
            .await
            .context("Failed to extend ERP sessions")?;

        Ok(result.rows_affected)
    }

    #[cfg(test)]
    pub async fn all(&self) -> Result<Vec<odoo_sessions::Model>> {
        let rows = odoo_sessions::Entity::find()
            .order_by_asc(odoo_sessions::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows)
    }
}
