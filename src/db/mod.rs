use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::product::{NewProduct, ProductRow};
pub use repositories::uom::UomSync;
pub use repositories::user::{NewUser, User};
pub use repositories::verification::NewVerificationResult;
pub use repositories::{roles, states};

use crate::crypto::EncryptedCredentials;
use crate::entities::{documents, odoo_sessions, products, scan_sessions, verification_results};
use crate::uom::Uom;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn scan_session_repo(&self) -> repositories::scan_session::ScanSessionRepository {
        repositories::scan_session::ScanSessionRepository::new(self.conn.clone())
    }

    fn product_repo(&self) -> repositories::product::ProductRepository {
        repositories::product::ProductRepository::new(self.conn.clone())
    }

    fn uom_repo(&self) -> repositories::uom::UomRepository {
        repositories::uom::UomRepository::new(self.conn.clone())
    }

    fn odoo_session_repo(&self) -> repositories::odoo_session::OdooSessionRepository {
        repositories::odoo_session::OdooSessionRepository::new(self.conn.clone())
    }

    fn document_repo(&self) -> repositories::document::DocumentRepository {
        repositories::document::DocumentRepository::new(self.conn.clone())
    }

    fn verification_repo(&self) -> repositories::verification::VerificationRepository {
        repositories::verification::VerificationRepository::new(self.conn.clone())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn create_user(&self, new: NewUser) -> Result<User> {
        self.user_repo().create(new).await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    // ------------------------------------------------------------------
    // Scan sessions
    // ------------------------------------------------------------------

    pub async fn create_scan_session(
        &self,
        user_id: i32,
        name: &str,
    ) -> Result<scan_sessions::Model> {
        self.scan_session_repo().create(user_id, name).await
    }

    pub async fn get_scan_session(&self, id: i32) -> Result<Option<scan_sessions::Model>> {
        self.scan_session_repo().get(id).await
    }

    pub async fn list_scan_sessions(
        &self,
        owner: Option<i32>,
        state: Option<&str>,
    ) -> Result<Vec<scan_sessions::Model>> {
        self.scan_session_repo().list(owner, state).await
    }

    pub async fn update_scan_session_meta(
        &self,
        id: i32,
        name: Option<&str>,
        warehouse: Option<(i32, Option<String>)>,
    ) -> Result<scan_sessions::Model> {
        self.scan_session_repo().update_meta(id, name, warehouse).await
    }

    pub async fn set_scan_session_state(&self, id: i32, state: &str) -> Result<()> {
        self.scan_session_repo().set_state(id, state).await
    }

    pub async fn delete_scan_session(&self, id: i32) -> Result<bool> {
        self.scan_session_repo().delete(id).await
    }

    pub async fn count_scan_sessions_by_state(&self, state: &str) -> Result<u64> {
        self.scan_session_repo().count_by_state(state).await
    }

    // ------------------------------------------------------------------
    // Products (scan lines)
    // ------------------------------------------------------------------

    pub async fn create_product(&self, new: NewProduct) -> Result<products::Model> {
        self.product_repo().create(new).await
    }

    pub async fn products_for_session(&self, session_id: i32) -> Result<Vec<products::Model>> {
        self.product_repo().list_by_session(session_id).await
    }

    pub async fn products_for_sessions(&self, session_ids: &[i32]) -> Result<Vec<products::Model>> {
        self.product_repo().list_by_sessions(session_ids).await
    }

    pub async fn products_for_document(&self, document_id: i32) -> Result<Vec<products::Model>> {
        self.product_repo().list_by_document(document_id).await
    }

    pub async fn product_export_rows(&self) -> Result<Vec<ProductRow>> {
        self.product_repo().export_rows().await
    }

    pub async fn recent_scans_by_barcode(
        &self,
        barcode: &str,
        limit: u64,
    ) -> Result<Vec<ProductRow>> {
        self.product_repo().recent_by_barcode(barcode, limit).await
    }

    pub async fn confirmed_products_with_sessions(
        &self,
    ) -> Result<Vec<(products::Model, Option<scan_sessions::Model>)>> {
        self.product_repo().confirmed_with_sessions().await
    }

    pub async fn mark_products_posted(&self, ids: &[i32], document_id: i32) -> Result<u64> {
        self.product_repo().mark_posted(ids, document_id).await
    }

    pub async fn cascade_product_state(
        &self,
        session_id: i32,
        from_state: &str,
        to_state: &str,
    ) -> Result<u64> {
        self.product_repo()
            .set_state_for_session(session_id, from_state, to_state)
            .await
    }

    pub async fn session_has_unposted_products(&self, session_id: i32) -> Result<bool> {
        self.product_repo().has_unposted_in_session(session_id).await
    }

    pub async fn count_products_by_state(&self, state: &str) -> Result<u64> {
        self.product_repo().count_by_state(state).await
    }

    pub async fn per_user_scan_totals(&self) -> Result<Vec<(Option<i32>, i64)>> {
        self.product_repo().per_user_totals().await
    }

    // ------------------------------------------------------------------
    // Units of measure
    // ------------------------------------------------------------------

    pub async fn list_uoms(&self) -> Result<Vec<Uom>> {
        self.uom_repo().list().await
    }

    pub async fn upsert_uoms(&self, units: Vec<UomSync>) -> Result<usize> {
        self.uom_repo().upsert_many(units).await
    }

    // ------------------------------------------------------------------
    // ERP session records
    // ------------------------------------------------------------------

    pub async fn find_active_erp_session(
        &self,
        user_id: i32,
    ) -> Result<Option<odoo_sessions::Model>> {
        self.odoo_session_repo().find_active(user_id).await
    }

    pub async fn create_active_erp_session(
        &self,
        user_id: i32,
        email: &str,
        blob: &EncryptedCredentials,
        expires_at: &str,
    ) -> Result<odoo_sessions::Model> {
        self.odoo_session_repo()
            .create_active(user_id, email, blob, expires_at)
            .await
    }

    pub async fn invalidate_erp_session(&self, session_id: i32) -> Result<()> {
        self.odoo_session_repo().invalidate(session_id).await
    }

    pub async fn clear_erp_sessions(&self, user_id: i32) -> Result<u64> {
        self.odoo_session_repo().clear_all(user_id).await
    }

    pub async fn deactivate_expired_erp_sessions(&self) -> Result<u64> {
        self.odoo_session_repo().deactivate_expired().await
    }

    pub async fn purge_inactive_erp_sessions(&self) -> Result<u64> {
        self.odoo_session_repo().purge_inactive().await
    }

    pub async fn extend_erp_sessions(&self, user_id: i32, new_expires_at: &str) -> Result<u64> {
        self.odoo_session_repo().extend(user_id, new_expires_at).await
    }

    #[cfg(test)]
    pub async fn all_erp_sessions(&self) -> Result<Vec<odoo_sessions::Model>> {
        self.odoo_session_repo().all().await
    }

    // ------------------------------------------------------------------
    // Documents & verification
    // ------------------------------------------------------------------

    pub async fn create_document(
        &self,
        name: &str,
        inventory_id: Option<i32>,
        state: &str,
        user_id: Option<i32>,
    ) -> Result<documents::Model> {
        self.document_repo()
            .create(name, inventory_id, state, user_id)
            .await
    }

    pub async fn get_document(&self, id: i32) -> Result<Option<documents::Model>> {
        self.document_repo().get(id).await
    }

    pub async fn list_documents(&self) -> Result<Vec<documents::Model>> {
        self.document_repo().list().await
    }

    pub async fn record_verification_entry(
        &self,
        new: NewVerificationResult,
    ) -> Result<verification_results::Model> {
        self.verification_repo().create(new).await
    }

    pub async fn verification_entries_for_line(
        &self,
        odoo_line_id: i32,
    ) -> Result<Vec<verification_results::Model>> {
        self.verification_repo().list_by_line(odoo_line_id).await
    }
}
