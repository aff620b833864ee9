//! Connection handler
//!
//! Drives the relay loop for a single connected peer.

use log::debug;
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::cipher::CipherService;
use crate::client::ClientConnection;
use crate::error::RelayError;
use crate::error::handlers::log_connection_error;
use crate::middleware::logging::log_disconnection;
use crate::protocol::FrameReader;
use crate::server::Broadcaster;

/// Per-connection relay loop.
///
/// - Reads one message at a time from the peer.
/// - Decrypts it, checks it is UTF-8 text, re-encrypts it with a fresh nonce.
/// - Broadcasts the new ciphertext to everyone except this peer.
///
/// Any receive error, EOF, decrypt failure, or malformed text ends the loop,
/// after which the connection is evicted from the registry and closed.
pub struct ConnectionHandler<R> {
    connection: Arc<ClientConnection>,
    reader: FrameReader<R>,
    cipher: Arc<CipherService>,
    broadcaster: Broadcaster,
}

impl<R: AsyncRead + Unpin> ConnectionHandler<R> {
    pub fn new(
        connection: Arc<ClientConnection>,
        reader: FrameReader<R>,
        cipher: Arc<CipherService>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            connection,
            reader,
            cipher,
            broadcaster,
        }
    }

    /// Runs until the peer goes away or another task closes the connection.
    ///
    /// Only the receive is raced against the close signal, so a broadcast
    /// already in progress always finishes writing whole messages.
    pub async fn run(mut self) {
        let connection = Arc::clone(&self.connection);
        let id = connection.id();
        let addr = connection.addr();

        let err = self.relay_loop().await;
        log_connection_error(id, addr, &err);

        self.broadcaster.registry().evict(&connection).await;
        log_disconnection(id, addr, self.broadcaster.registry().len().await);
    }

    async fn relay_loop(&mut self) -> RelayError {
        loop {
            if let Err(e) = self.relay_once().await {
                return e;
            }
        }
    }

    async fn relay_once(&mut self) -> Result<(), RelayError> {
        let ciphertext = tokio::select! {
            message = self.reader.read_message() => message?,
            _ = self.connection.closed() => return Err(RelayError::Closed),
        };
        let plaintext = self.cipher.decrypt(&ciphertext)?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|e| RelayError::Protocol(format!("message is not valid UTF-8: {}", e)))?;

        debug!(
            "Relaying {} bytes from {}",
            text.len(),
            self.connection.id()
        );

        let reencrypted = self.cipher.encrypt(text.as_bytes())?;
        self.broadcaster
            .broadcast(&reencrypted, Some(self.connection.id()))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientRegistry;
    use crate::protocol::{Framing, write_message};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, DuplexStream, duplex};

    struct Peer {
        connection: Arc<ClientConnection>,
        // Peer's end of the server -> peer direction.
        inbox: DuplexStream,
        // Peer's end of the peer -> server direction.
        outbox: DuplexStream,
        server_reader: Option<FrameReader<DuplexStream>>,
    }

    fn peer() -> Peer {
        let addr: SocketAddr = "127.0.0.1:40002".parse().unwrap();
        let (to_peer, inbox) = duplex(1024);
        let (outbox, from_peer) = duplex(1024);
        Peer {
            connection: Arc::new(ClientConnection::new(addr, to_peer, Framing::Raw)),
            inbox,
            outbox,
            server_reader: Some(FrameReader::new(from_peer, Framing::Raw, 1024, 1024)),
        }
    }

    async fn spawn_handler(
        peer: &mut Peer,
        cipher: &Arc<CipherService>,
        broadcaster: &Broadcaster,
    ) -> tokio::task::JoinHandle<()> {
        broadcaster
            .registry()
            .add(Arc::clone(&peer.connection))
            .await;
        let handler = ConnectionHandler::new(
            Arc::clone(&peer.connection),
            peer.server_reader.take().unwrap(),
            Arc::clone(cipher),
            broadcaster.clone(),
        );
        tokio::spawn(handler.run())
    }

    async fn read_chunk(stream: &mut DuplexStream) -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        buf.truncate(n);
        buf
    }

    #[tokio::test]
    async fn test_relays_reencrypted_text_to_others() {
        let cipher = Arc::new(CipherService::generate());
        let broadcaster = Broadcaster::new(Arc::new(ClientRegistry::new()));
        let mut a = peer();
        let mut b = peer();
        let _ha = spawn_handler(&mut a, &cipher, &broadcaster).await;
        let _hb = spawn_handler(&mut b, &cipher, &broadcaster).await;

        let sealed = cipher.encrypt(b"hi").unwrap();
        write_message(&mut a.outbox, Framing::Raw, &sealed).await.unwrap();

        let received = read_chunk(&mut b.inbox).await;
        assert_ne!(received, sealed);
        assert_eq!(cipher.decrypt(&received).unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_bad_ciphertext_disconnects_sender() {
        let cipher = Arc::new(CipherService::generate());
        let registry = Arc::new(ClientRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut a = peer();
        let handle = spawn_handler(&mut a, &cipher, &broadcaster).await;

        let foreign = CipherService::generate().encrypt(b"intruder").unwrap();
        write_message(&mut a.outbox, Framing::Raw, &foreign).await.unwrap();

        handle.await.unwrap();
        assert!(registry.is_empty().await);
        assert!(a.connection.is_closed());
    }

    #[tokio::test]
    async fn test_invalid_utf8_disconnects_sender() {
        let cipher = Arc::new(CipherService::generate());
        let registry = Arc::new(ClientRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut a = peer();
        let handle = spawn_handler(&mut a, &cipher, &broadcaster).await;

        let sealed = cipher.encrypt(&[0xff, 0xfe, 0xfd]).unwrap();
        write_message(&mut a.outbox, Framing::Raw, &sealed).await.unwrap();

        handle.await.unwrap();
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_peer_eof_cleans_up() {
        let cipher = Arc::new(CipherService::generate());
        let registry = Arc::new(ClientRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut a = peer();
        let handle = spawn_handler(&mut a, &cipher, &broadcaster).await;

        drop(a.outbox);
        handle.await.unwrap();
        assert!(registry.is_empty().await);
        assert!(a.connection.is_closed());
    }

    #[tokio::test]
    async fn test_handler_stops_when_evicted_elsewhere() {
        let cipher = Arc::new(CipherService::generate());
        let registry = Arc::new(ClientRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut a = peer();
        let handle = spawn_handler(&mut a, &cipher, &broadcaster).await;

        registry.evict(&a.connection).await;
        handle.await.unwrap();
        assert!(registry.is_empty().await);
    }
}
