//! Kick Library
//!
//! Secure introspection and control for a running application: health,
//! system stats, log reading, queue inspection and whitelisted command
//! execution, served over token-scoped REST routes and an MCP endpoint.
//!
//! Everything returned to a caller passes through the PII scrubber.

pub mod app;
pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod health;
pub mod logs;
pub mod mcp;
pub mod queue;
pub mod scrubber;
pub mod server;
pub mod stats;

pub use app::{Kick, KickBuilder};
pub use config::KickConfig;
pub use error::KickError;
