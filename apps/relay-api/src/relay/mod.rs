pub mod broadcast;
pub mod events;
pub mod handler;
pub mod registry;
pub mod server;
pub mod session;
