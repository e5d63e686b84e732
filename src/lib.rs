//! Ranch monitoring backend.
//!
//! Relays camera frames to an AI vision provider, keeps a durable,
//! size-bounded history of the resulting analyses, and relays voice
//! sessions to an AI voice provider over WebSocket.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod server;
pub mod vision;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
