//! Framework-agnostic approval logic.
//!
//! Nothing in here depends on Discord: the chat platform is reached through
//! [`chat::ChatClient`] and exchange rates through [`exchange::RateSource`].

pub mod chat;
pub mod directory;
pub mod escalation;
pub mod exchange;
pub mod file;
pub mod message;
pub mod order;
pub mod routing;
pub mod session;
pub mod settings;
pub mod sync;
pub mod workflow;
