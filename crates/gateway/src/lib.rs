use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod uploads;

use crate::config::Config;
use crate::crypto::TokenKeys;
use crate::services::{AuthService, ReportService};
use crate::store::Stores;
use crate::uploads::UploadStore;

pub const HEALTH_MESSAGE: &str = "Billboard Reports API Running";

pub struct AppState {
    pub config: Config,
    pub auth: AuthService,
    pub reports: ReportService,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let tokens = TokenKeys::new(&config.jwt_secret, config.token_ttl);
        let uploads = UploadStore::new(config.upload_dir.clone());
        Self {
            auth: AuthService::new(stores.users, tokens),
            reports: ReportService::new(stores.reports, uploads),
            config,
        }
    }
}

/// The full HTTP surface: auth, reports, admin listing, static uploads and the health check.
pub fn app(state: Arc<AppState>) -> Router {
    let authenticated = from_fn_with_state(Arc::clone(&state), middleware::authenticate);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let submit_report = post(handlers::reports::create_report)
        .route_layer(authenticated.clone())
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    Router::new()
        .route("/", get(health_check))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/api/auth/change-password", post(handlers::auth::change_password))
        .route(
            "/api/reports",
            get(handlers::reports::list_reports).merge(submit_report),
        )
        .route(
            "/api/reports/:id",
            delete(handlers::reports::delete_report).route_layer(authenticated.clone()),
        )
        .route(
            "/api/admin/users",
            get(handlers::admin::list_users)
                .route_layer(from_fn(middleware::require_admin))
                .route_layer(authenticated),
        )
        .nest_service("/uploads", ServeDir::new(state.reports.uploads().dir()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> &'static str {
    HEALTH_MESSAGE
}
