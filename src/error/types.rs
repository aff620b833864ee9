//! Error types
//!
//! Defines the error types for the cipher layer and for the relay itself.

use std::fmt;
use std::io;

/// Cipher module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Session key had the wrong length.
    InvalidKeyLength { expected: usize, actual: usize },
    /// Plaintext could not be sealed (exceeds the AEAD message limit).
    Encryption,
    /// Ciphertext was malformed, truncated, tampered with, or produced under another key.
    Decryption,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherError::InvalidKeyLength { expected, actual } => {
                write!(f, "Invalid key length: expected {} bytes, got {}", expected, actual)
            }
            CipherError::Encryption => write!(f, "Encryption failed"),
            CipherError::Decryption => write!(f, "Decryption failed"),
        }
    }
}

impl std::error::Error for CipherError {}

/// General relay error that encompasses all error types
#[derive(Debug)]
pub enum RelayError {
    /// Listener could not be bound. Fatal at startup.
    Bind(String, io::Error),
    /// Receive/send failure, peer reset, or EOF.
    Transport(io::Error),
    /// Ciphertext failed validation.
    Cipher(CipherError),
    /// Connection was closed by another task (evicted after a failed send).
    Closed,
    /// Peer violated the wire format (invalid UTF-8, oversize frame).
    Protocol(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            RelayError::Transport(e) => write!(f, "Transport error: {}", e),
            RelayError::Cipher(e) => write!(f, "Cipher error: {}", e),
            RelayError::Closed => write!(f, "Connection closed by relay"),
            RelayError::Protocol(e) => write!(f, "Protocol error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Bind(_, e) | RelayError::Transport(e) => Some(e),
            RelayError::Cipher(e) => Some(e),
            RelayError::Closed | RelayError::Protocol(_) => None,
        }
    }
}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Transport(error)
    }
}

impl From<CipherError> for RelayError {
    fn from(error: CipherError) -> Self {
        RelayError::Cipher(error)
    }
}

impl RelayError {
    /// Whether the error is the peer closing the connection cleanly.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            RelayError::Transport(e) if e.kind() == io::ErrorKind::UnexpectedEof
        )
    }

    /// Whether only the message just received was bad, not the connection.
    ///
    /// Clients skip such messages and keep listening.
    pub fn is_unreadable_message(&self) -> bool {
        matches!(self, RelayError::Cipher(_) | RelayError::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_message_classification() {
        assert!(RelayError::Cipher(CipherError::Decryption).is_unreadable_message());
        assert!(RelayError::Protocol("bad utf-8".into()).is_unreadable_message());
        assert!(!RelayError::Closed.is_unreadable_message());

        let eof = RelayError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(eof.is_disconnect());
        assert!(!eof.is_unreadable_message());
    }
}
