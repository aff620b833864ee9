//! Module `peer`
//!
//! Client side of the relay protocol: connect, take the session key from the
//! handshake, then exchange encrypted UTF-8 text with the other participants.
//!
//! Clients may also wrap a line in a details envelope
//! (`method,timestamp,ip,client_id,message`) before encrypting it. The relay
//! never looks inside the plaintext, so envelopes are built and read only
//! here.

use std::net::IpAddr;

use chrono::Local;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use uuid::Uuid;

use crate::cipher::CipherService;
use crate::error::RelayError;
use crate::protocol::{FrameReader, Framing, receive_session_key, write_message};

/// Receive buffer for raw framing on the client side.
pub const CLIENT_READ_BUFFER_SIZE: usize = 4096;

/// Largest length-prefixed frame a client accepts.
pub const CLIENT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Timestamp layout used in details envelopes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How an envelope asks receivers to display its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMethod {
    /// Show the message alone.
    Plain,
    /// Show the message followed by the sender's ip, id and timestamp.
    WithDetails,
}

impl SendMethod {
    fn tag(self) -> &'static str {
        match self {
            SendMethod::Plain => "SendMessage",
            SendMethod::WithDetails => "SendMessageWithDetails",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SendMessage" => Some(SendMethod::Plain),
            "SendMessageWithDetails" => Some(SendMethod::WithDetails),
            _ => None,
        }
    }
}

/// A chat line together with who sent it and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub method: SendMethod,
    pub timestamp: String,
    pub ip: String,
    pub client_id: String,
    pub message: String,
}

impl MessageEnvelope {
    /// Wraps `message`, stamped with the current local time.
    pub fn new(method: SendMethod, ip: IpAddr, client_id: Uuid, message: &str) -> Self {
        Self {
            method,
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            ip: ip.to_string(),
            client_id: client_id.to_string(),
            message: message.to_string(),
        }
    }

    /// Comma-separated wire text. The message goes last so it may contain commas.
    pub fn encode(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.method.tag(),
            self.timestamp,
            self.ip,
            self.client_id,
            self.message
        )
    }

    /// Parses envelope text; `None` when `text` is not an envelope.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.splitn(5, ',');
        let method = SendMethod::from_tag(parts.next()?)?;
        let timestamp = parts.next()?.to_string();
        let ip = parts.next()?.to_string();
        let client_id = parts.next()?.to_string();
        let message = parts.next()?.to_string();
        Some(Self {
            method,
            timestamp,
            ip,
            client_id,
            message,
        })
    }

    /// Display form: the bare message, or `message, ip, id, timestamp`.
    pub fn render(&self) -> String {
        match self.method {
            SendMethod::Plain => self.message.clone(),
            SendMethod::WithDetails => format!(
                "{}, {}, {}, {}",
                self.message, self.ip, self.client_id, self.timestamp
            ),
        }
    }
}

/// Display form of received text. Text that is not an envelope is shown as is.
pub fn render_incoming(text: &str) -> String {
    match MessageEnvelope::parse(text) {
        Some(envelope) => envelope.render(),
        None => text.to_string(),
    }
}

/// Receiving half of a relay client.
pub struct RelayReceiver {
    reader: FrameReader<OwnedReadHalf>,
    cipher: CipherService,
}

impl RelayReceiver {
    /// Waits for the next relayed message and decrypts it.
    pub async fn recv_text(&mut self) -> Result<String, RelayError> {
        let ciphertext = self.reader.read_message().await?;
        let plaintext = self.cipher.decrypt(&ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|e| RelayError::Protocol(format!("message is not valid UTF-8: {}", e)))
    }
}

/// Sending half of a relay client.
pub struct RelaySender {
    writer: OwnedWriteHalf,
    cipher: CipherService,
    framing: Framing,
    client_id: Uuid,
}

impl RelaySender {
    /// Encrypts `text` under the session key and sends it.
    pub async fn send_text(&mut self, text: &str) -> Result<(), RelayError> {
        let ciphertext = self.cipher.encrypt(text.as_bytes())?;
        self.send_raw(&ciphertext).await
    }

    /// Sends `text` in a details envelope carrying this client's local ip,
    /// id and the current time.
    pub async fn send_text_with_details(&mut self, text: &str) -> Result<(), RelayError> {
        let ip = self.writer.local_addr()?.ip();
        let envelope = MessageEnvelope::new(SendMethod::WithDetails, ip, self.client_id, text);
        self.send_text(&envelope.encode()).await
    }

    /// Sends bytes as-is, without encrypting them.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), RelayError> {
        write_message(&mut self.writer, self.framing, bytes).await?;
        Ok(())
    }

    /// Id stamped into details envelopes. Fixed for the life of the client.
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }
}

/// A connected relay participant.
pub struct RelayClient {
    sender: RelaySender,
    receiver: RelayReceiver,
}

impl RelayClient {
    /// Connects and completes the handshake.
    ///
    /// `framing` must match the server's configuration.
    pub async fn connect<A: ToSocketAddrs>(addr: A, framing: Framing) -> Result<Self, RelayError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (mut read_half, write_half) = stream.into_split();

        let cipher = receive_session_key(&mut read_half).await?;

        Ok(Self {
            sender: RelaySender {
                writer: write_half,
                cipher: cipher.clone(),
                framing,
                client_id: Uuid::new_v4(),
            },
            receiver: RelayReceiver {
                reader: FrameReader::new(
                    read_half,
                    framing,
                    CLIENT_READ_BUFFER_SIZE,
                    CLIENT_MAX_MESSAGE_SIZE,
                ),
                cipher,
            },
        })
    }

    /// The session cipher learned from the handshake.
    pub fn cipher(&self) -> &CipherService {
        &self.sender.cipher
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), RelayError> {
        self.sender.send_text(text).await
    }

    pub async fn send_text_with_details(&mut self, text: &str) -> Result<(), RelayError> {
        self.sender.send_text_with_details(text).await
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), RelayError> {
        self.sender.send_raw(bytes).await
    }

    pub fn client_id(&self) -> Uuid {
        self.sender.client_id()
    }

    pub async fn recv_text(&mut self) -> Result<String, RelayError> {
        self.receiver.recv_text().await
    }

    /// Splits the client so sending and receiving can run in separate tasks.
    pub fn into_split(self) -> (RelaySender, RelayReceiver) {
        (self.sender, self.receiver)
    }
}
