// ReBAC engine API server
// Thin axum HTTP surface over the rebac-engine permission graph.

mod config;
mod handlers;
mod routes;

use config::Config;
use dotenvy::dotenv;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub struct AppState {
    pub tuple_store: rebac_engine::TupleStore,
    pub hierarchy_store: rebac_engine::HierarchyStore,
    pub evaluator: rebac_engine::Evaluator,
    pub expiration_manager: rebac_engine::ExpirationManager,
    pub maintenance: rebac_engine::Maintenance,
    pub audit_sink: rebac_engine::AuditSink,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,rebac_api=debug,tower_http=debug".to_string()),
        )
        .init();

    tracing::info!("🚀 Starting ReBAC API Server");
    tracing::info!("📦 Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    tracing::info!("🔌 Server: {}:{}", config.server_host, config.server_port);

    tracing::info!("🗄️  Connecting to database...");
    let database = rebac_database::Database::new(config.database.clone())
        .await
        .expect("Failed to connect to database");
    database.ping().await.expect("Database ping failed");
    tracing::info!("✅ Database connected");

    let cache = if config.cache_enabled {
        tracing::info!("⚡ Connecting to Redis...");
        let cache = rebac_cache::Cache::new(config.cache.clone()).await.expect("Failed to connect to Redis");
        cache.ping().await.expect("Redis ping failed");
        tracing::info!("✅ Redis connected, check results will be cached");
        Some(cache)
    } else {
        tracing::info!("⚡ Check cache disabled (CHECK_CACHE_ENABLED unset)");
        None
    };

    let audit_sink = rebac_engine::AuditSink::new(database.pool().clone());
    match audit_sink.ensure_partitions(rebac_engine::DEFAULT_PARTITIONS_AHEAD).await {
        Ok(created) if !created.is_empty() => tracing::info!(?created, "audit partitions created"),
        Ok(_) => {}
        Err(err) => tracing::warn!(%err, "failed to ensure audit partitions at startup"),
    }

    let tuple_store = rebac_engine::TupleStore::new(database.pool().clone(), audit_sink.clone());
    let hierarchy_store = rebac_engine::HierarchyStore::new(database.pool().clone(), audit_sink.clone());
    let evaluator = match cache {
        Some(cache) => rebac_engine::Evaluator::with_cache(database.pool().clone(), cache),
        None => rebac_engine::Evaluator::new(database.pool().clone()),
    };
    let expiration_manager = rebac_engine::ExpirationManager::new(database.pool().clone());
    let maintenance = rebac_engine::Maintenance::new(database.pool().clone());
    tracing::info!("🛡️  Engine wired: tuple store, hierarchy store, evaluator, expiration manager, maintenance");

    let state = Arc::new(AppState {
        tuple_store,
        hierarchy_store,
        evaluator,
        expiration_manager,
        maintenance,
        audit_sink,
    });

    let app = routes::create_router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    tracing::info!("📡 Routes configured:");
    tracing::info!("   GET  /health");
    tracing::info!("   POST /v1/tuples");
    tracing::info!("   POST /v1/check");
    tracing::info!("   POST /v1/resources");
    tracing::info!("   POST /v1/users");
    tracing::info!("   GET  /v1/maintenance/stats");

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("Failed to bind to address");

    tracing::info!("✅ Server ready at http://{}", addr);
    axum::serve(listener, app).await.expect("Server error");

    Ok(())
}
