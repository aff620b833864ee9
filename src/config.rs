//! Configuration management for the relay server
//!
//! Settings are layered: built-in defaults, then an optional `relay.toml`,
//! then `RAX_RELAY_*` environment variables. All values are read once at
//! startup; changing them requires a restart.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::protocol::Framing;

const DEFAULT_CONFIG_FILE: &str = "relay";
const ENV_PREFIX: &str = "RAX_RELAY";

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: i64 = 12345;
const DEFAULT_READ_BUFFER_SIZE: i64 = 1024;
const DEFAULT_MAX_MESSAGE_SIZE: i64 = 64 * 1024;
const DEFAULT_MAX_CLIENTS: i64 = 1024;

/// Relay server configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// IP address or host name to listen on
    /// Environment: RAX_RELAY_BIND_ADDRESS
    pub bind_address: String,

    /// TCP port to listen on (0 picks an ephemeral port)
    /// Environment: RAX_RELAY_PORT
    pub port: u16,

    /// Bytes requested per receive in raw framing; one receive is one message
    pub read_buffer_size: usize,

    /// Largest frame accepted in length-prefixed framing
    pub max_message_size: usize,

    /// Connections beyond this count are refused before the handshake
    /// Environment: RAX_RELAY_MAX_CLIENTS
    pub max_clients: usize,

    /// Message framing on the relay channel
    pub framing: Framing,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT as u16,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE as usize,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE as usize,
            max_clients: DEFAULT_MAX_CLIENTS as usize,
            framing: Framing::Raw,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `relay.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from the given file stem (if present) with environment overrides
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = defaults()?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Listen address as `host:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Message("bind_address cannot be empty".into()));
        }

        if self.read_buffer_size == 0 {
            return Err(ConfigError::Message(
                "read_buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_message_size < self.read_buffer_size {
            return Err(ConfigError::Message(
                "max_message_size must be at least read_buffer_size".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
        .set_default("port", DEFAULT_PORT)?
        .set_default("read_buffer_size", DEFAULT_READ_BUFFER_SIZE)?
        .set_default("max_message_size", DEFAULT_MAX_MESSAGE_SIZE)?
        .set_default("max_clients", DEFAULT_MAX_CLIENTS)?
        .set_default("framing", "raw")
}
