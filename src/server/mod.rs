//! Server core functionality
//!
//! This module contains the accept loop, the key handshake dispatch, and
//! broadcast fan-out over the client registry.

pub mod broadcast;
pub mod core;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use core::RelayServer;
