use std::sync::Arc;

use crate::clients::odoo::OdooGateway;
use crate::config::Config;
use crate::crypto::SessionCipher;
use crate::db::Store;
use crate::services::{ErpGateway, ErpSessionManager, ExportService, ReconcileService};

#[derive(Clone)]
pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub odoo: Arc<OdooGateway>,

    pub erp_sessions: Arc<ErpSessionManager>,

    pub reconcile: Arc<ReconcileService>,

    pub export: Arc<ExportService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let odoo = Arc::new(OdooGateway::new(config.odoo.clone())?);
        let gateway: Arc<dyn ErpGateway> = odoo.clone();

        let cipher = SessionCipher::from_config(&config.erp_session)?;
        let erp_sessions = Arc::new(ErpSessionManager::new(
            store.clone(),
            cipher,
            gateway,
            &config.erp_session,
        ));

        let reconcile = Arc::new(ReconcileService::new(
            store.clone(),
            config.odoo.max_post_lines,
        ));
        let export = Arc::new(ExportService::new(store.clone()));

        Ok(Self {
            config,
            store,
            odoo,
            erp_sessions,
            reconcile,
            export,
        })
    }
}
