use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::clients::odoo::OdooGateway;
use crate::config::Config;
use crate::services::{ErpSessionManager, ExportService, ReconcileService};
use crate::state::SharedState;

mod admin;
pub mod auth;
mod erp;
mod error;
mod export;
mod products;
mod scan;
mod sessions;
mod system;
mod types;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn odoo_gateway(&self) -> &Arc<OdooGateway> {
        &self.shared.odoo
    }

    #[must_use]
    pub fn erp_sessions(&self) -> &Arc<ErpSessionManager> {
        &self.shared.erp_sessions
    }

    #[must_use]
    pub fn reconcile(&self) -> &Arc<ReconcileService> {
        &self.shared.reconcile
    }

    #[must_use]
    pub fn export(&self) -> &Arc<ExportService> {
        &self.shared.export
    }
}

pub fn create_app_state(shared: Arc<SharedState>) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
    })
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();
    let idle_minutes = state.config().server.session_idle_minutes;

    // Admin surface: reconciliation, verification, maintenance. The role
    // guard runs inside the auth guard applied below.
    let admin_routes = Router::new()
        .route("/admin/unposted", get(admin::unposted))
        .route("/admin/unposted/post", post(admin::post_unposted))
        .route("/admin/documents", get(admin::documents))
        .route("/admin/documents/{id}/download", get(export::document))
        .route("/admin/verification", get(admin::verification_lines))
        .route(
            "/admin/verification/{line_id}",
            get(admin::verification_detail),
        )
        .route(
            "/admin/verification/{line_id}/entries",
            post(admin::add_verification_entry),
        )
        .route("/admin/verifiers", get(admin::verifiers))
        .route("/admin/uoms/sync", post(admin::sync_uoms))
        .route("/admin/statistics", get(admin::statistics))
        .route(
            "/system/maintenance/purge-sessions",
            post(system::purge_sessions),
        )
        .layer(middleware::from_fn(auth::require_admin));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/erp/session",
            post(erp::establish)
                .get(erp::info)
                .put(erp::extend)
                .delete(erp::clear),
        )
        .route("/scan", post(scan::submit))
        .route("/products/search", get(products::search))
        .route("/uoms", get(products::list_uoms))
        .route("/warehouses", get(products::warehouses))
        .route("/locations", get(products::locations))
        .route("/sessions", get(sessions::list))
        .route(
            "/sessions/{id}",
            get(sessions::get)
                .put(sessions::update)
                .delete(sessions::delete),
        )
        .route("/sessions/{id}/products", post(sessions::add_products))
        .route("/sessions/{id}/confirm", post(sessions::confirm))
        .route("/export/excel", get(export::excel))
        .route("/system/status", get(system::status))
        .merge(admin_routes)
        .layer(middleware::from_fn(auth::require_auth));

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(idle_minutes)));

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
