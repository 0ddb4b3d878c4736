pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod relay;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use db::kv::KeyValueStore;
use relay::broadcast::RoomBroadcaster;
use relay::registry::ConnectionRegistry;
use store::MessageStore;

/// Shared application state available to route handlers and the relay loop.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub config: Arc<Config>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcast: RoomBroadcaster,
}
