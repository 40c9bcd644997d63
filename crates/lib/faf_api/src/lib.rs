//! # faf_api
//!
//! HTTP API for account management.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use faf_core::accounts::service::AccountService;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{metrics, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Account lifecycle manager with its collaborators.
    pub service: Arc<AccountService>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Run embedded database migrations.
///
/// Delegates to `faf_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    faf_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_USERS_ACTIVATE, post(users::activate))
        .route(
            routes::POST_USERS_REQUEST_PASSWORD_RESET,
            post(users::request_password_reset),
        )
        .route(
            routes::POST_USERS_PERFORM_PASSWORD_RESET,
            post(users::perform_password_reset),
        )
        .route(routes::GET_USERS_LINK_TO_STEAM, get(users::link_to_steam))
        .route(routes::GET_METRICS, get(metrics::render));

    // Protected routes (bearer access token required; scopes and roles are
    // checked per handler)
    let protected = Router::new()
        .route(routes::POST_USERS_REGISTER, post(users::register))
        .route(routes::POST_USERS_CHANGE_PASSWORD, post(users::change_password))
        .route(routes::POST_USERS_CHANGE_USERNAME, post(users::change_username))
        .route(
            routes::POST_USERS_ID_FORCE_CHANGE_USERNAME,
            post(users::force_change_username),
        )
        .route(routes::POST_USERS_CHANGE_EMAIL, post(users::change_email))
        .route(
            routes::POST_USERS_BUILD_STEAM_LINK_URL,
            post(users::build_steam_link_url),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
