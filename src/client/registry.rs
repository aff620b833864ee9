//! Client registry
//!
//! The authoritative set of broadcast-eligible connections.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::client::{ClientConnection, ConnectionId};

/// Registry for tracking active clients
///
/// Holds exactly the connections that should receive future broadcasts. The
/// lock is only held for map operations, never across a send.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<BTreeMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `connection`. Returns `false` if it was already registered.
    pub async fn add(&self, connection: Arc<ClientConnection>) -> bool {
        let mut clients = self.clients.lock().await;
        if clients.contains_key(&connection.id()) {
            return false;
        }
        clients.insert(connection.id(), connection);
        true
    }

    /// Removes the connection if present. Removing an absent id is a no-op.
    ///
    /// Does not close the transport; use [`evict`](Self::evict) for that.
    pub async fn remove(&self, id: ConnectionId) -> Option<Arc<ClientConnection>> {
        self.clients.lock().await.remove(&id)
    }

    /// Removes the connection and closes its transport.
    ///
    /// Idempotent: every cleanup path goes through here, so broadcast
    /// failure handling and the connection's own handler may both call it.
    pub async fn evict(&self, connection: &ClientConnection) -> bool {
        let removed = self.remove(connection.id()).await.is_some();
        connection.close().await;
        removed
    }

    /// Point-in-time copy of the members in arrival order.
    pub async fn snapshot_for_broadcast(&self) -> Vec<Arc<ClientConnection>> {
        self.clients.lock().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}
