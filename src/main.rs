//! RAX Relay - Entry Point
//!
//! An encrypted broadcast relay: every message one client sends is decrypted,
//! re-encrypted, and forwarded to all other connected clients.

use log::{error, info};

use rax_relay::RelayServer;
use rax_relay::config::ServerConfig;

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching relay server...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let server = match RelayServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            std::process::exit(1);
        }
    };

    server.accept_loop().await;
}
