//! Module `framing`
//!
//! Splits the byte stream of a relay connection into messages.
//!
//! Two framings are supported:
//!
//! - [`Framing::Raw`]: a single receive of up to `read_buffer_size` bytes is
//!   one message. There is no delimiter, so a message larger than the buffer
//!   or two messages coalesced by the transport are misread. This is the
//!   default and matches what existing clients speak.
//! - [`Framing::LengthPrefixed`]: each message is preceded by its length as a
//!   4-byte big-endian integer. Opt-in; both ends must agree on it.

use serde::Deserialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RelayError;

/// Size of the length prefix in [`Framing::LengthPrefixed`].
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Message framing used on the relay channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// One receive call yields one message.
    #[default]
    Raw,
    /// `[len: u32 BE][payload]`
    LengthPrefixed,
}

/// Reads whole messages from the receive half of a connection.
pub struct FrameReader<R> {
    inner: R,
    framing: Framing,
    buf: Vec<u8>,
    max_message_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, framing: Framing, read_buffer_size: usize, max_message_size: usize) -> Self {
        Self {
            inner,
            framing,
            buf: vec![0u8; read_buffer_size],
            max_message_size,
        }
    }

    /// Waits for the next message.
    ///
    /// A peer that closes the connection yields a transport error of kind
    /// `UnexpectedEof`, so callers can treat every `Err` as terminal.
    pub async fn read_message(&mut self) -> Result<Vec<u8>, RelayError> {
        match self.framing {
            Framing::Raw => {
                let n = self.inner.read(&mut self.buf).await?;
                if n == 0 {
                    return Err(eof().into());
                }
                Ok(self.buf[..n].to_vec())
            }
            Framing::LengthPrefixed => {
                let len = self.inner.read_u32().await? as usize;
                if len > self.max_message_size {
                    return Err(RelayError::Protocol(format!(
                        "frame of {} bytes exceeds limit of {}",
                        len, self.max_message_size
                    )));
                }
                let mut message = vec![0u8; len];
                self.inner.read_exact(&mut message).await?;
                Ok(message)
            }
        }
    }
}

/// Writes one message with the given framing and flushes it.
pub async fn write_message<W>(writer: &mut W, framing: Framing, message: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    match framing {
        Framing::Raw => writer.write_all(message).await?,
        Framing::LengthPrefixed => {
            let len = u32::try_from(message.len()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "message too large to frame")
            })?;
            let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + message.len());
            frame.extend_from_slice(&len.to_be_bytes());
            frame.extend_from_slice(message);
            writer.write_all(&frame).await?;
        }
    }
    writer.flush().await
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection")
}
