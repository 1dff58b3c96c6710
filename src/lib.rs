// src/lib.rs

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use services::{oauth::OAuthService, sync_engine::SyncEngine, sync_log::SyncLogService, sync_store::DbSyncStore};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub engine: Arc<SyncEngine>,
    pub sync_store: DbSyncStore,
    pub sync_logs: SyncLogService,
    pub oauth: OAuthService,
}

pub mod entities {
    pub mod prelude;
    pub mod sync_logs;
    pub mod syncs;
    pub mod users;
}

pub mod services {
    pub mod error;
    pub mod filter;
    pub mod notion;
    pub mod oauth;
    pub mod record_matcher;
    pub mod relation_resolver;
    pub mod retry;
    pub mod sheets;
    pub mod sync_engine;
    pub mod sync_log;
    pub mod sync_store;
    pub mod transformer;
}

pub mod config;
pub mod handlers;
pub mod jobs;
pub mod models;

/// All HTTP routes, without middleware layers
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/auth/{provider}", post(handlers::auth::authorization_url))
        .route("/auth/{provider}/callback", post(handlers::auth::oauth_callback))
        .route("/sync/create", post(handlers::sync::create_sync))
        .route("/sync/run/{id}", post(handlers::sync::run_sync))
        .route("/sync/{id}/logs", get(handlers::sync::get_sync_logs))
        .with_state(state)
}
