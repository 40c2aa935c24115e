use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use super::states;
use crate::entities::scan_sessions;

pub struct ScanSessionRepository {
    conn: DatabaseConnection,
}

impl ScanSessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, user_id: i32, name: &str) -> Result<scan_sessions::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let model = scan_sessions::ActiveModel {
            name: Set(name.to_string()),
            user_id: Set(user_id),
            state: Set(states::DRAFT.to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = model
            .insert(&self.conn)
            .await
            .context("Failed to create scan session")?;

        Ok(created)
    }

    pub async fn get(&self, id: i32) -> Result<Option<scan_sessions::Model>> {
        let session = scan_sessions::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query scan session")?;

        Ok(session)
    }

    /// List sessions, newest first. `owner` restricts to one user (checkers
    /// only see their own); `state` filters by lifecycle state.
    pub async fn list(
        &self,
        owner: Option<i32>,
        state: Option<&str>,
    ) -> Result<Vec<scan_sessions::Model>> {
        let mut query = scan_sessions::Entity::find();

        if let Some(user_id) = owner {
            query = query.filter(scan_sessions::Column::UserId.eq(user_id));
        }
        if let Some(state) = state {
            query = query.filter(scan_sessions::Column::State.eq(state));
        }

        let sessions = query
            .order_by_desc(scan_sessions::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list scan sessions")?;

        Ok(sessions)
    }

    pub async fn update_meta(
        &self,
        id: i32,
        name: Option<&str>,
        warehouse: Option<(i32, Option<String>)>,
    ) -> Result<scan_sessions::Model> {
        let session = scan_sessions::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query scan session for update")?
            .ok_or_else(|| anyhow::anyhow!("Scan session not found: {id}"))?;

        let mut active: scan_sessions::ActiveModel = session.into();
        if let Some(name) = name {
            active.name = Set(name.to_string());
        }
        if let Some((warehouse_id, warehouse_name)) = warehouse {
            active.warehouse_id = Set(Some(warehouse_id));
            active.warehouse_name = Set(warehouse_name);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active.update(&self.conn).await?;
        Ok(updated)
    }

    pub async fn set_state(&self, id: i32, state: &str) -> Result<()> {
        let session = scan_sessions::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query scan session for state change")?
            .ok_or_else(|| anyhow::anyhow!("Scan session not found: {id}"))?;

        let mut active: scan_sessions::ActiveModel = session.into();
        active.state = Set(state.to_string());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = scan_sessions::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete scan session")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count_by_state(&self, state: &str) -> Result<u64> {
        let count = scan_sessions::Entity::find()
            .filter(scan_sessions::Column::State.eq(state))
            .count(&self.conn)
            .await
            .context("Failed to count scan sessions")?;

        Ok(count)
    }

}
