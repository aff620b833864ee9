//! Error handling
//!
//! Defines error types and handling for the relay.

pub mod handlers;
pub mod types;

pub use types::*;
