use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

use crate::entities::documents;

pub struct DocumentRepository {
    conn: DatabaseConnection,
}

impl DocumentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        name: &str,
        inventory_id: Option<i32>,
        state: &str,
        user_id: Option<i32>,
    ) -> Result<documents::Model> {
        let model = documents::ActiveModel {
            name: Set(name.to_string()),
            inventory_id: Set(inventory_id),
            state: Set(state.to_string()),
            user_id: Set(user_id),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let created = model
            .insert(&self.conn)
            .await
            .context("Failed to create document")?;

        Ok(created)
    }

    pub async fn get(&self, id: i32) -> Result<Option<documents::Model>> {
        let document = documents::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query document")?;

        Ok(document)
    }

    pub async fn list(&self) -> Result<Vec<documents::Model>> {
        let documents = documents::Entity::find()
            .order_by_desc(documents::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list documents")?;

        Ok(documents)
    }
}
