//! Client management system
//!
//! Handles connected peers, the shared registry, and the per-peer relay loop.

pub mod connection;
pub mod handler;
pub mod registry;

pub use connection::{ClientConnection, ConnectionId};
pub use handler::ConnectionHandler;
pub use registry::ClientRegistry;
