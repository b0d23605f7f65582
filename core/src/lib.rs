pub mod approval;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod keys;
pub mod ledger;
pub mod llm;
pub mod logger;
pub mod parser;
pub mod registry;
pub mod session;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use config::Config;
pub use engine::{Engine, TerminalContext};
pub use error::ShellwiseError;
pub use gateway::{GatewayEvent, InferenceGateway};
pub use ids::{RequestId, SessionId};
pub use session::{Effect, Mode, Session, SessionEvent};
