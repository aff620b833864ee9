//! Relay wire protocol
//!
//! Handles the session-key handshake and message framing on the relay channel.

pub mod framing;
pub mod handshake;

pub use framing::{FrameReader, Framing, write_message};
pub use handshake::{receive_session_key, send_session_key};
