//! Logging middleware
//!
//! Connection lifecycle log lines.

use log::{info, warn};
use std::io;
use std::net::SocketAddr;

use crate::client::ConnectionId;

/// Log an accepted TCP connection
pub fn log_connection(client_addr: SocketAddr) {
    info!("Connection established with {}", client_addr);
}

/// Log a client that finished the handshake and joined the registry
pub fn log_registered(id: ConnectionId, client_addr: SocketAddr, active: usize) {
    info!("Client {} ({}) registered ({} active)", id, client_addr, active);
}

/// Log a connection refused because the registry is full
pub fn log_refused(client_addr: SocketAddr, max_clients: usize) {
    warn!(
        "Refusing {}: already serving {} clients",
        client_addr, max_clients
    );
}

/// Log a recipient dropped after a failed broadcast send
pub fn log_eviction(id: ConnectionId, client_addr: SocketAddr, err: &io::Error) {
    warn!("Evicting {} ({}) after failed send: {}", id, client_addr, err);
}

/// Log a connection leaving the relay
pub fn log_disconnection(id: ConnectionId, client_addr: SocketAddr, remaining: usize) {
    info!(
        "Client {} ({}) disconnected ({} remaining)",
        id, client_addr, remaining
    );
}
