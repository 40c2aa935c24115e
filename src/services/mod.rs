pub mod erp_session;
pub use erp_session::{ErpGateway, ErpSessionError, ErpSessionManager};

pub mod reconcile;
pub use reconcile::ReconcileService;

pub mod export;
pub use export::ExportService;
