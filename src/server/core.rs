use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use crate::cipher::CipherService;
use crate::client::{ClientConnection, ClientRegistry, ConnectionHandler, ConnectionId};
use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::middleware::logging::{log_connection, log_refused, log_registered};
use crate::protocol::{FrameReader, send_session_key};
use crate::server::broadcast::{BroadcastReport, Broadcaster};

/// Encrypted broadcast relay server.
///
/// Owns the listener, the session cipher, and the client registry. Each
/// accepted connection receives the session key, joins the registry, and is
/// served by its own task until it disconnects.
pub struct RelayServer {
    listener: TcpListener,
    cipher: Arc<CipherService>,
    broadcaster: Broadcaster,
    config: Arc<ServerConfig>,
}

impl RelayServer {
    /// Binds the listener and generates this process's session key.
    pub async fn bind(config: ServerConfig) -> Result<Self, RelayError> {
        Self::with_cipher(config, CipherService::generate()).await
    }

    /// Binds the listener using an existing cipher.
    pub async fn with_cipher(config: ServerConfig, cipher: CipherService) -> Result<Self, RelayError> {
        let listen_addr = config.listen_addr();
        let listener = match TcpListener::bind(&listen_addr).await {
            Ok(listener) => {
                info!("Server bound to {}", listen_addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", listen_addr, e);
                return Err(RelayError::Bind(listen_addr, e));
            }
        };

        warn!("Session key is sent to clients unencrypted during the handshake");

        Ok(Self {
            listener,
            cipher: Arc::new(cipher),
            broadcaster: Broadcaster::new(Arc::new(ClientRegistry::new())),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(self.broadcaster.registry())
    }

    pub fn cipher(&self) -> Arc<CipherService> {
        Arc::clone(&self.cipher)
    }

    /// Sends `message` to every registered client except `sender`.
    pub async fn broadcast(&self, message: &[u8], sender: Option<ConnectionId>) -> BroadcastReport {
        self.broadcaster.broadcast(message, sender).await
    }

    /// Accepts connections forever.
    ///
    /// Accept errors are logged and the loop keeps listening; failures on a
    /// single connection never reach it.
    pub async fn accept_loop(&self) {
        info!(
            "Relay listening on {} (max {} clients, {:?} framing)",
            self.config.listen_addr(),
            self.config.max_clients,
            self.config.framing
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    log_connection(addr);

                    let registry = self.broadcaster.registry();
                    if registry.len().await >= self.config.max_clients {
                        log_refused(addr, self.config.max_clients);
                        continue;
                    }

                    let cipher = Arc::clone(&self.cipher);
                    let broadcaster = self.broadcaster.clone();
                    let config = Arc::clone(&self.config);

                    // Spawn a task for each client so the accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) = handle_new_client(stream, addr, cipher, broadcaster, config).await {
                            warn!("Failed to set up client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Handshakes, registers, and serves one client until it goes away.
async fn handle_new_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    cipher: Arc<CipherService>,
    broadcaster: Broadcaster,
    config: Arc<ServerConfig>,
) -> Result<(), RelayError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", client_addr, e);
    }

    let (read_half, mut write_half) = stream.into_split();

    send_session_key(&mut write_half, &cipher).await?;

    let connection = Arc::new(ClientConnection::new(
        client_addr,
        write_half,
        config.framing,
    ));
    let registry = broadcaster.registry();
    registry.add(Arc::clone(&connection)).await;
    log_registered(connection.id(), client_addr, registry.len().await);

    let reader = FrameReader::new(
        read_half,
        config.framing,
        config.read_buffer_size,
        config.max_message_size,
    );

    ConnectionHandler::new(connection, reader, cipher, broadcaster)
        .run()
        .await;

    Ok(())
}
