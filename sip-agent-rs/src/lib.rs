pub mod actions;
pub mod agent;
pub mod chain;
pub mod character;
pub mod config;
pub mod providers;

pub use actions::{ActionContext, ActionRegistry, ActionReply};
pub use agent::SipAgent;
pub use chain::{Chain, ChainError, SipChain, Web3Service};
pub use character::Character;
pub use config::SipConfig;
