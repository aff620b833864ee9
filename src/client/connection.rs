//! Module `connection`
//!
//! Defines `ClientConnection`, the shared handle to one connected peer.
//! The registry, the peer's own handler, and every broadcast that targets the
//! peer all hold the same `Arc<ClientConnection>`.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, watch};

use crate::protocol::{Framing, write_message};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a connection for the lifetime of the process.
///
/// Ids are handed out in accept order, so sorting by id gives arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One active peer.
///
/// Owns the write half of the transport. Writes are serialized by an async
/// mutex so two broadcasts never interleave bytes on the same socket. Once
/// [`close`](Self::close) runs the writer is gone and every later send fails
/// with `NotConnected`.
pub struct ClientConnection {
    id: ConnectionId,
    addr: SocketAddr,
    framing: Framing,
    writer: Mutex<Option<BoxedWriter>>,
    closed: watch::Sender<bool>,
}

impl ClientConnection {
    pub fn new<W>(addr: SocketAddr, writer: W, framing: Framing) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::next(),
            addr,
            framing,
            writer: Mutex::new(Some(Box::new(writer))),
            closed,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends one already-encrypted message, framed for this connection.
    pub async fn send(&self, message: &[u8]) -> io::Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection closed"))?;
        write_message(writer, self.framing, message).await
    }

    /// Shuts down the transport and wakes anyone waiting in [`closed`](Self::closed).
    ///
    /// Safe to call any number of times; shutdown errors are ignored.
    pub async fn close(&self) {
        let writer = self.writer.lock().await.take();
        self.closed.send_replace(true);

        if let Some(mut writer) = writer {
            let _ = writer.shutdown().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the connection has been closed by any task.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
