use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_api::config::Config;
use relay_api::db::kv::{KeyValueStore, MemoryStore};
use relay_api::relay::broadcast::RoomBroadcaster;
use relay_api::relay::registry::ConnectionRegistry;
use relay_api::store::{MessageStore, PgMessageStore};
use relay_api::AppState;
use sanare_common::SnowflakeGenerator;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Connect to PostgreSQL.
    let db = relay_api::db::pool::connect(&config.database_url).await;
    let snowflake = Arc::new(SnowflakeGenerator::new(config.worker_id));
    let store: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(db, snowflake));

    // In-memory KV for tickets. Replace with RedisStore when ticket state
    // moves out of process.
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let registry = Arc::new(ConnectionRegistry::new());
    let broadcast = RoomBroadcaster::new(registry.clone());

    tracing::info!(worker_id = config.worker_id, "relay-api configured");

    let state = AppState {
        store,
        kv,
        config: Arc::new(config),
        registry,
        broadcast,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(relay_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "relay-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
