pub mod chain;
pub mod chat;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod mining;
pub mod msg;
pub mod node;

pub use chain::Blockchain;
pub use chat::Chat;
pub use config::Config;
pub use msg::Message;
pub use node::Node;
