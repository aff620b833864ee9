//! Error handlers
//!
//! Logging for errors that end a single connection.

use crate::client::ConnectionId;
use crate::error::types::RelayError;
use log::{info, warn};
use std::net::SocketAddr;

/// Log why a connection's handler terminated.
///
/// Clean disconnects are informational; everything else is a warning. Either
/// way the error stays contained in that connection.
pub fn log_connection_error(id: ConnectionId, addr: SocketAddr, err: &RelayError) {
    if err.is_disconnect() {
        info!("Connection {} ({}) closed by peer", id, addr);
    } else if matches!(err, RelayError::Closed) {
        info!("Connection {} ({}) was evicted, stopping handler", id, addr);
    } else {
        warn!("Connection {} ({}) terminated: {}", id, addr, err);
    }
}
