//! Broadcast fan-out
//!
//! Delivers one ciphertext to every registered connection except the sender.

use log::debug;
use std::sync::Arc;

use crate::client::{ClientRegistry, ConnectionId};
use crate::middleware::logging::log_eviction;

/// Outcome of a single broadcast call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<ConnectionId>,
    pub evicted: Vec<ConnectionId>,
}

/// Fans messages out over a shared [`ClientRegistry`].
///
/// Cheap to clone; every connection handler holds one.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Sends `message` to every registered connection other than `sender`.
    ///
    /// Iterates over a snapshot so the registry lock is never held during
    /// I/O. Delivery is per recipient: a recipient whose send fails is closed
    /// and evicted on the spot, without retry, and the remaining recipients
    /// are still served.
    pub async fn broadcast(&self, message: &[u8], sender: Option<ConnectionId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for connection in self.registry.snapshot_for_broadcast().await {
            if Some(connection.id()) == sender {
                continue;
            }

            match connection.send(message).await {
                Ok(()) => report.delivered.push(connection.id()),
                Err(e) => {
                    log_eviction(connection.id(), connection.addr(), &e);
                    self.registry.evict(&connection).await;
                    report.evicted.push(connection.id());
                }
            }
        }

        debug!(
            "Broadcast of {} bytes: {} delivered, {} evicted",
            message.len(),
            report.delivered.len(),
            report.evicted.len()
        );
        report
    }
}
