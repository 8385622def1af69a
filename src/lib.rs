//! socnet - A small social network backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - JSON endpoints under /api                                │
//! │  - Bearer token extractors                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Validation and per-viewer projection                     │
//! │  - Fan-out worker, notification dispatch                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx), write transactions                        │
//! │  - Cursor pagination builder                                │
//! │  - Local avatar storage                                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `storage`: Avatar object storage
//! - `auth`: Token authentication
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use service::{
    CommentService, FanoutSettings, FanoutSignal, FanoutWorker, NotificationService, PostService,
    TimelineService, UserService,
};

/// Application state shared across all handlers
///
/// Constructed once at startup and shared read-only afterwards.
/// Cloning is cheap; every field is reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Bearer token codec
    pub tokens: Arc<auth::TokenCodec>,

    /// Avatar object storage
    pub avatars: Arc<dyn storage::AvatarStore>,

    /// Wakes the fan-out worker after a post commits
    pub fanout: FanoutSignal,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Build the token codec
    /// 3. Open avatar storage
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect_with(
            &config.database.path,
            data::PoolSettings {
                max_connections: config.database.max_connections,
                busy_timeout: Duration::from_secs(config.database.busy_timeout_seconds),
            },
        )
        .await?;
        tracing::info!("Database connected");

        let tokens = auth::TokenCodec::new(&config.auth.token_secret, config.auth.token_ttl_seconds);

        tokio::fs::create_dir_all(&config.storage.avatars_dir).await?;
        let avatars = storage::LocalAvatarStore::new(config.storage.avatars_dir.clone());
        tracing::info!(dir = %config.storage.avatars_dir.display(), "Avatar storage initialized");

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            tokens: Arc::new(tokens),
            avatars: Arc::new(avatars),
            fanout: FanoutSignal::default(),
        })
    }

    fn base_url(&self) -> String {
        self.config.server.base_url().to_string()
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(
            self.db.clone(),
            self.tokens.clone(),
            self.avatars.clone(),
            self.base_url(),
        )
    }

    pub fn post_service(&self) -> PostService {
        PostService::new(self.db.clone(), self.fanout.clone(), self.base_url())
    }

    pub fn comment_service(&self) -> CommentService {
        CommentService::new(self.db.clone(), self.base_url())
    }

    pub fn timeline_service(&self) -> TimelineService {
        TimelineService::new(self.db.clone(), self.base_url())
    }

    pub fn notification_service(&self) -> NotificationService {
        NotificationService::new(self.db.clone())
    }

    /// Fan-out worker wired to this state's database and wake-up signal
    pub fn fanout_worker(&self) -> FanoutWorker {
        FanoutWorker::new(
            self.db.clone(),
            self.fanout.clone(),
            FanoutSettings::from(&self.config.fanout),
        )
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{services::ServeDir, trace::TraceLayer};

    let avatars = ServeDir::new(&state.config.storage.avatars_dir);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::api_router())
        .nest_service("/img/avatars", avatars)
        .layer(axum::middleware::from_fn(api::track_http))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.config.server))
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server origin; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
