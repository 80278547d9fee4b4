//! MCP (Model Context Protocol) Server
//!
//! Exposes the Kick operations as MCP tools over JSON-RPC 2.0 on a single
//! HTTP endpoint, `POST /mcp/{prefix}`.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Dispatch Layer** (`server`): method routing and the axum handler
//! 3. **Tool Layer** (`tools`): one tool per Kick operation

pub mod protocol;

pub mod server;

pub mod tools;

pub use protocol::{McpError, McpMethod, McpRequest, McpResponse, Tool, ToolCallParams, ToolResult};
pub use server::{handle_http, handle_message};

#[cfg(test)]
mod proptests;
