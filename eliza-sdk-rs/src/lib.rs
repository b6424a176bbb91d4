pub mod error;
pub mod logger;
pub mod messaging;
pub mod models;
pub mod session;
pub mod socket;

pub use error::{ElizaError, Result};
pub use messaging::MessagingClient;
pub use socket::{RelayEvent, SocketConfig, SocketManager};
