use bettersync_backend::{
    AppState, build_router,
    config::AppConfig,
    jobs::sync_scheduler::start_sync_scheduler,
    services::{
        notion::NotionService,
        oauth::OAuthService,
        sheets::SheetsService,
        sync_engine::SyncEngine,
        sync_log::SyncLogService,
        sync_store::{DbSyncStore, SyncStore},
    },
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bettersync_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().expect("Invalid configuration");

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Services
    let sync_store = DbSyncStore::new(db.clone());
    let sync_logs = SyncLogService::new(db.clone());
    let engine = Arc::new(
        SyncEngine::new(
            Arc::new(NotionService::new(config.notion_base_url.clone())),
            Arc::new(SheetsService::new(config.sheets_base_url.clone())),
            Arc::new(sync_store.clone()),
            Arc::new(sync_logs.clone()),
        )
        .with_retry_policy(config.retry),
    );
    let oauth = OAuthService::new(config.oauth_clients.clone(), config.oauth_state_ttl);

    // Background scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let store: Arc<dyn SyncStore> = Arc::new(sync_store.clone());
    let scheduler = start_sync_scheduler(Arc::clone(&engine), store, config.scheduler_tick, shutdown_rx);

    let state = AppState {
        db,
        engine,
        sync_store,
        sync_logs,
        oauth,
    };

    // Build router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .expect("Server error");

    if let Err(e) = scheduler.await {
        tracing::warn!("Sync scheduler ended abnormally: {}", e);
    }
    tracing::info!("Shutdown complete");
}
