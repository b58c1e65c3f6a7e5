// src/lib.rs
use anyhow::{Context, Result};
use app_state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::env;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use handlers::*;

// Public exports (visible outside this module)
pub mod client;
pub mod domain;

// Internal-only exports (sibling access within this module)
mod app_state;
mod config;
mod error;
mod handlers;
mod infrastructure;
mod session;

// Hoist up only the public symbol(s)
pub use error::{ApiError, ErrorResponse};
pub use handlers::{
    CreateProfileRequest, DeleteItemResponse, LoginRequest, LoginResponse, MessageResponse,
    RefreshRequest, RegisterRequest,
};
pub use session::{
    peek_claims, Claims, Identity, TokenError, TokenIssuer, TokenKind, TokenPair, TokenTtls,
};

pub use config::*;

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    connect_with_retry, // ---
    create_memory_repository,
    create_noop_metrics,
    create_postgres_repository,
    create_prom_metrics,
    run_migrations,
    AttachmentStore,
};

use domain::{MetricsPtr, RepositoryPtr};

/// `/register`, `/login` and `/token`.
fn auth_router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/token", post(refresh_token))
}

/// Profile and item routes. Every handler checks the caller owns `{id}`.
fn users_router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/users", post(create_profile))
        .route("/users/{id}", get(get_profile).put(update_profile))
        .route("/users/{id}/items", get(list_items).post(add_item))
        .route(
            "/users/{id}/items/{item_id}",
            put(update_item).delete(delete_item),
        )
        .route("/users/{id}/sync", post(sync_items))
}

fn expiry_router() -> Router<AppState> {
    // ---
    Router::new().route("/users/{id}/items/expiring", get(expiring))
}

/// Permissive when no origins are configured.
fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    // ---
    if allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the HTTP router over an already constructed store and metrics backend.
///
/// Tests use this with the in-memory repository; `create_router` uses it with
/// whatever the environment selects.
pub fn create_router_with(
    config: &AppConfig,
    repository: RepositoryPtr,
    metrics: MetricsPtr,
) -> Result<Router> {
    // ---
    let tokens = Arc::new(TokenIssuer::from_config(&config.auth)?);
    let attachments = Arc::new(AttachmentStore::new(config.uploads.dir.clone()));

    let app_state = AppState::new(
        metrics,
        repository,
        tokens,
        attachments,
        config.auth.bcrypt_cost,
    );

    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(auth_router())
        .merge(users_router())
        .merge(expiry_router())
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            track_http_metrics,
        ))
        .nest_service("/uploads", ServeDir::new(&config.uploads.dir))
        .layer(DefaultBodyLimit::max(config.uploads.max_bytes))
        .layer(cors_layer(&config.server.allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Ok(router)
}

/// Build the HTTP router with the store and metrics implementation determined
/// by configuration and environment variables.
///
/// For the Postgres store this connects (with retries) and creates the schema.
pub async fn create_router(config: &AppConfig) -> Result<Router> {
    // ---
    // Determine metrics implementation from environment
    let metrics_type = env::var("GARANT_METRICS_TYPE").unwrap_or_else(|_| "noop".to_string());
    let metrics = if metrics_type == "prom" {
        create_prom_metrics()?
    } else {
        create_noop_metrics()?
    };

    let repository = match config.store {
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            create_memory_repository()
        }
        StoreKind::Postgres => {
            let database = config
                .database
                .as_ref()
                .context("Postgres store selected without database configuration")?;
            let pool = connect_with_retry(database).await?;
            run_migrations(&pool).await?;
            create_postgres_repository(pool)
        }
    };

    create_router_with(config, repository, metrics)
}
