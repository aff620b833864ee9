//! Server middleware
//!
//! Provides logging for the relay.

pub mod logging;
