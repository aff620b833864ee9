//! Module `handshake`
//!
//! Session-key distribution. Immediately after accept the server writes the
//! raw session key as the very first bytes on the connection, before any
//! relay traffic, and the client reads exactly [`KEY_SIZE`] bytes.
//!
//! The key travels unencrypted over the same channel that later carries the
//! ciphertext, so anyone observing the connection can read every message.
//! Existing clients depend on this exchange; replacing it with a key
//! agreement would be a protocol change for both ends.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cipher::{CipherService, KEY_SIZE};
use crate::error::RelayError;

/// Sends the raw session key to a newly accepted client.
pub async fn send_session_key<W>(writer: &mut W, cipher: &CipherService) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(cipher.key_bytes()).await?;
    writer.flush().await
}

/// Reads the session key sent by the server and builds a cipher from it.
pub async fn receive_session_key<R>(reader: &mut R) -> Result<CipherService, RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut key = [0u8; KEY_SIZE];
    reader.read_exact(&mut key).await?;
    Ok(CipherService::from_key(&key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_key_exchange_yields_same_session() {
        let (mut server_side, mut client_side) = duplex(64);
        let server_cipher = CipherService::generate();

        send_session_key(&mut server_side, &server_cipher).await.unwrap();
        let client_cipher = receive_session_key(&mut client_side).await.unwrap();

        assert_eq!(client_cipher.key_bytes(), server_cipher.key_bytes());
        let sealed = client_cipher.encrypt(b"hi").unwrap();
        assert_eq!(server_cipher.decrypt(&sealed).unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_short_key_is_disconnect() {
        let (mut server_side, mut client_side) = duplex(64);
        server_side.write_all(&[1u8; 10]).await.unwrap();
        drop(server_side);

        let err = receive_session_key(&mut client_side).await.unwrap_err();
        assert!(err.is_disconnect());
    }
}
