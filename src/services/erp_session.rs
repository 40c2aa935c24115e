//! Cached, credentialed ERP sessions.
//!
//! One reusable authenticated handle per local user: credentials are sealed
//! at rest, validated against the ERP on each use, re-established from a
//! supplied password when the stored ones stop working, and retired by an
//! externally triggered maintenance sweep.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::clients::odoo::{OdooClient, OdooError, OdooGateway};
use crate::config::ErpSessionConfig;
use crate::crypto::{EncryptedCredentials, SessionCipher};
use crate::db::Store;
use crate::entities::odoo_sessions;

#[derive(Debug, Error)]
pub enum ErpSessionError {
    /// The ERP rejected the supplied credentials. Recoverable: the caller
    /// re-prompts for a password.
    #[error("ERP authentication failed")]
    AuthenticationFailed,

    #[error(transparent)]
    Erp(#[from] OdooError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Seam over the ERP login so the cache can be exercised without a live
/// backend. The real implementation is [`OdooGateway`].
#[async_trait]
pub trait ErpGateway: Send + Sync {
    async fn login(&self, email: &str, password: &str)
    -> Result<Option<OdooClient>, OdooError>;
}

#[async_trait]
impl ErpGateway for OdooGateway {
    async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<OdooClient>, OdooError> {
        Self::login(self, email, password).await
    }
}

/// What actually gets sealed into a session record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    email: String,
    password: String,
    authenticated_at: String,
    erp_uid: i64,
}

/// Non-secret view of the current active record.
#[derive(Debug, Clone, Serialize)]
pub struct ErpSessionInfo {
    pub id: i32,
    pub email: String,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MaintenanceReport {
    pub expired: u64,
    pub purged: u64,
}

pub struct ErpSessionManager {
    store: Store,
    cipher: SessionCipher,
    gateway: Arc<dyn ErpGateway>,
    expiration_hours: i64,
}

impl ErpSessionManager {
    #[must_use]
    pub fn new(
        store: Store,
        cipher: SessionCipher,
        gateway: Arc<dyn ErpGateway>,
        config: &ErpSessionConfig,
    ) -> Self {
        Self {
            store,
            cipher,
            gateway,
            expiration_hours: config.expiration_hours,
        }
    }

    /// Obtain an authenticated ERP handle for `user_id`.
    ///
    /// Reuses the stored session when its credentials still authenticate;
    /// otherwise establishes a fresh one from `password`. With no usable
    /// record and no password this returns `Ok(None)` so the caller can
    /// prompt for credentials instead of treating it as a failure.
    pub async fn get_handle(
        &self,
        user_id: i32,
        email: &str,
        password: Option<&str>,
    ) -> Result<Option<OdooClient>, ErpSessionError> {
        if let Some(record) = self.store.find_active_erp_session(user_id).await? {
            match self.open_record(&record) {
                Ok(credentials) => {
                    match self
                        .gateway
                        .login(&credentials.email, &credentials.password)
                        .await?
                    {
                        Some(client) => {
                            info!(user_id, email = client.email(), "Reused existing ERP session");
                            return Ok(Some(client));
                        }
                        None => {
                            info!(user_id, "Stored ERP session no longer valid, invalidating");
                            self.store.invalidate_erp_session(record.id).await?;
                        }
                    }
                }
                Err(e) => {
                    // Fail closed on integrity problems: the record is dead,
                    // force a fresh authentication.
                    warn!(user_id, record_id = record.id, error = %e,
                        "Could not decrypt stored ERP credentials, invalidating");
                    self.store.invalidate_erp_session(record.id).await?;
                }
            }
        }

        let Some(password) = password else {
            return Ok(None);
        };

        let Some(client) = self.gateway.login(email, password).await? else {
            return Err(ErpSessionError::AuthenticationFailed);
        };

        let blob = self.seal_credentials(email, password, client.uid())?;
        let expires_at = (chrono::Utc::now() + chrono::Duration::hours(self.expiration_hours))
            .to_rfc3339();

        self.store
            .create_active_erp_session(user_id, email, &blob, &expires_at)
            .await?;

        info!(user_id, "Created new ERP session");
        Ok(Some(client))
    }

    /// Mark one record inactive; idempotent.
    pub async fn invalidate(&self, session_id: i32) -> Result<(), ErpSessionError> {
        self.store.invalidate_erp_session(session_id).await?;
        Ok(())
    }

    /// Mark all of a user's active records inactive.
    pub async fn clear_all(&self, user_id: i32) -> Result<u64, ErpSessionError> {
        let cleared = self.store.clear_erp_sessions(user_id).await?;
        info!(user_id, cleared, "Cleared ERP sessions");
        Ok(cleared)
    }

    /// Retire active records whose expiry passed, then delete everything
    /// inactive. Runs on explicit triggers (CLI or admin endpoint), never on
    /// the request path.
    pub async fn run_maintenance(&self) -> Result<MaintenanceReport, ErpSessionError> {
        let expired = self.store.deactivate_expired_erp_sessions().await?;
        let purged = self.store.purge_inactive_erp_sessions().await?;
        info!(expired, purged, "ERP session maintenance complete");
        Ok(MaintenanceReport { expired, purged })
    }

    pub async fn session_info(
        &self,
        user_id: i32,
    ) -> Result<Option<ErpSessionInfo>, ErpSessionError> {
        let record = self.store.find_active_erp_session(user_id).await?;

        Ok(record.map(|r| ErpSessionInfo {
            id: r.id,
            email: r.email,
            expires_at: r.expires_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }))
    }

    /// Push out the expiry of the user's active records.
    pub async fn extend(
        &self,
        user_id: i32,
        additional_hours: i64,
    ) -> Result<u64, ErpSessionError> {
        let new_expiry =
            (chrono::Utc::now() + chrono::Duration::hours(additional_hours)).to_rfc3339();
        let extended = self.store.extend_erp_sessions(user_id, &new_expiry).await?;
        Ok(extended)
    }

    fn seal_credentials(
        &self,
        email: &str,
        password: &str,
        erp_uid: i64,
    ) -> Result<EncryptedCredentials, ErpSessionError> {
        let credentials = StoredCredentials {
            email: email.to_string(),
            password: password.to_string(),
            authenticated_at: chrono::Utc::now().to_rfc3339(),
            erp_uid,
        };

        let plaintext = serde_json::to_vec(&credentials)
            .map_err(|e| ErpSessionError::Storage(anyhow::anyhow!(e)))?;

        self.cipher
            .encrypt(&plaintext)
            .map_err(|e| ErpSessionError::Storage(anyhow::anyhow!(e)))
    }

    fn open_record(
        &self,
        record: &odoo_sessions::Model,
    ) -> Result<StoredCredentials, anyhow::Error> {
        let blob = EncryptedCredentials {
            key_id: record.key_id.clone(),
            nonce: record.nonce.clone(),
            cipher_text: record.cipher_text.clone(),
            auth_tag: record.auth_tag.clone(),
        };

        let plaintext = self.cipher.decrypt(&blob)?;
        let credentials = serde_json::from_slice(&plaintext)?;
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, OdooConfig};
    use sea_orm::sea_query::Expr;
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Gateway with a programmable set of accepted credentials.
    struct ScriptedGateway {
        accepted: Mutex<HashMap<String, String>>,
    }

    impl ScriptedGateway {
        fn accepting(email: &str, password: &str) -> Arc<Self> {
            let mut accepted = HashMap::new();
            accepted.insert(email.to_string(), password.to_string());
            Arc::new(Self {
                accepted: Mutex::new(accepted),
            })
        }

        fn set_password(&self, email: &str, password: &str) {
            self.accepted
                .lock()
                .unwrap()
                .insert(email.to_string(), password.to_string());
        }
    }

    #[async_trait]
    impl ErpGateway for ScriptedGateway {
        async fn login(
            &self,
            email: &str,
            password: &str,
        ) -> Result<Option<OdooClient>, OdooError> {
            let accepted = self.accepted.lock().unwrap();
            if accepted.get(email).is_some_and(|p| p == password) {
                Ok(Some(OdooClient::stub(
                    OdooConfig::default(),
                    email,
                    password,
                    42,
                )))
            } else {
                Ok(None)
            }
        }
    }

    const USER_ID: i32 = 1; // bootstrap admin seeded by migration
    const EMAIL: &str = "checker@example.com";

    async fn manager_with(gateway: Arc<dyn ErpGateway>) -> (ErpSessionManager, Store) {
        // A pooled in-memory database would hand each connection its own
        // empty schema, so use a throwaway file per test.
        let db_path =
            std::env::temp_dir().join(format!("opname-erp-session-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", db_path.display()))
            .await
            .unwrap();
        let config = Config::default();
        let cipher = SessionCipher::from_config(&config.erp_session).unwrap();
        let manager = ErpSessionManager::new(store.clone(), cipher, gateway, &config.erp_session);
        (manager, store)
    }

    #[tokio::test]
    async fn no_session_and_no_password_returns_none() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        let handle = manager.get_handle(USER_ID, EMAIL, None).await.unwrap();
        assert!(handle.is_none());
        assert!(store.all_erp_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn password_login_persists_one_active_record() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        let handle = manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();
        assert!(handle.is_some());

        let records = store.all_erp_sessions().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_active);
        assert_eq!(records[0].email, EMAIL);
        assert_eq!(records[0].key_id, "v1");
        // The stored blob must not leak the plaintext password.
        assert!(!records[0].cipher_text.contains("secret"));
    }

    #[tokio::test]
    async fn wrong_password_is_an_authentication_error() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        let result = manager.get_handle(USER_ID, EMAIL, Some("wrong")).await;
        assert!(matches!(result, Err(ErpSessionError::AuthenticationFailed)));
        assert!(store.all_erp_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_session_is_reused_without_password() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();

        let handle = manager.get_handle(USER_ID, EMAIL, None).await.unwrap();
        assert!(handle.is_some());
        assert_eq!(store.all_erp_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_session_is_invalidated_and_none_without_password() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway.clone()).await;

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();

        // The ERP password changed behind our back.
        gateway.set_password(EMAIL, "rotated");

        let handle = manager.get_handle(USER_ID, EMAIL, None).await.unwrap();
        assert!(handle.is_none());

        let records = store.all_erp_sessions().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_active);
    }

    #[tokio::test]
    async fn relogin_after_rotation_deactivates_the_old_record() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway.clone()).await;

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();

        gateway.set_password(EMAIL, "rotated");

        let handle = manager
            .get_handle(USER_ID, EMAIL, Some("rotated"))
            .await
            .unwrap();
        assert!(handle.is_some());

        let records = store.all_erp_sessions().await.unwrap();
        assert_eq!(records.len(), 2);
        let active: Vec<_> = records.iter().filter(|r| r.is_active).collect();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn tampered_record_forces_reauthentication() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();

        // Flip the stored ciphertext to simulate corruption at rest.
        odoo_sessions::Entity::update_many()
            .col_expr(
                odoo_sessions::Column::CipherText,
                Expr::value("bm90LXRoZS1yZWFsLWNpcGhlcnRleHQ="),
            )
            .exec(&store.conn)
            .await
            .unwrap();

        let handle = manager.get_handle(USER_ID, EMAIL, None).await.unwrap();
        assert!(handle.is_none());

        let records = store.all_erp_sessions().await.unwrap();
        assert!(!records[0].is_active);
    }

    #[tokio::test]
    async fn clear_all_deactivates_active_records() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();

        let cleared = manager.clear_all(USER_ID).await.unwrap();
        assert_eq!(cleared, 1);
        assert!(store.all_erp_sessions().await.unwrap().iter().all(|r| !r.is_active));
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();
        let id = store.all_erp_sessions().await.unwrap()[0].id;

        manager.invalidate(id).await.unwrap();
        manager.invalidate(id).await.unwrap();
        manager.invalidate(9999).await.unwrap();

        assert!(!store.all_erp_sessions().await.unwrap()[0].is_active);
    }

    #[tokio::test]
    async fn maintenance_expires_then_purges_only_inactive() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();

        // Second user with an already-expired record and an inactive one.
        let other_user = store
            .create_user(crate::db::NewUser {
                id: 77,
                name: "Other".to_string(),
                email: "other@example.com".to_string(),
                password_hash: "x".to_string(),
                role: "checker".to_string(),
            })
            .await
            .unwrap();

        let cipher = SessionCipher::from_config(&Config::default().erp_session).unwrap();
        let blob = cipher.encrypt(b"{}").unwrap();
        let past = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        store
            .create_active_erp_session(other_user.id, &other_user.email, &blob, &past)
            .await
            .unwrap();

        let report = manager.run_maintenance().await.unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.purged, 1);

        // The live session must be untouched.
        let records = store.all_erp_sessions().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_active);
        assert_eq!(records[0].user_id, USER_ID);
    }

    #[tokio::test]
    async fn expired_record_is_not_reused() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, store) = manager_with(gateway).await;

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();

        let past = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        odoo_sessions::Entity::update_many()
            .col_expr(odoo_sessions::Column::ExpiresAt, Expr::value(past))
            .filter(odoo_sessions::Column::UserId.eq(USER_ID))
            .exec(&store.conn)
            .await
            .unwrap();

        let handle = manager.get_handle(USER_ID, EMAIL, None).await.unwrap();
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn session_info_and_extend() {
        let gateway = ScriptedGateway::accepting(EMAIL, "secret");
        let (manager, _store) = manager_with(gateway).await;

        assert!(manager.session_info(USER_ID).await.unwrap().is_none());

        manager
            .get_handle(USER_ID, EMAIL, Some("secret"))
            .await
            .unwrap();

        let info = manager.session_info(USER_ID).await.unwrap().unwrap();
        assert_eq!(info.email, EMAIL);
        let before = info.expires_at.clone();

        let extended = manager.extend(USER_ID, 48).await.unwrap();
        assert_eq!(extended, 1);

        let info = manager.session_info(USER_ID).await.unwrap().unwrap();
        assert!(info.expires_at > before);
    }
}
