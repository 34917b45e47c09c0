pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod http_client;
pub mod keygen;
pub mod offer;
pub mod runtime;
pub mod server;
pub mod store;
pub mod telegram;
