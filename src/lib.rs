pub mod cipher;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod peer;
pub mod protocol;
pub mod server;

pub use cipher::CipherService;
pub use error::{CipherError, RelayError};
pub use server::RelayServer;
