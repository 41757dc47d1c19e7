//! FRED chat front end, library crate.
//!
//! Re-exports all modules so external crates (e.g. `fred-e2e-tests`) can
//! drive conversations, the TCP server and rule reloads directly.

pub mod config;
pub mod convo;
pub mod loader;
pub mod server;
pub mod shared;

pub use config::{ChatConfig, EngineConfig, ServerConfig, SessionMode, Transport};
pub use convo::{Conversation, Fallbacks, StreamConversation, chat};
pub use loader::{load_rule_files, reload_from_files};
pub use shared::{EngineHandle, Session};
