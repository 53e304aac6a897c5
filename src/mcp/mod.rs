/// MCP protocol implementation
///
/// This module handles the Model Context Protocol communication:
/// JSON-RPC parsing, tool routing and cancellation of AI requests.

pub mod protocol;
pub mod server;

// Re-export main types
pub use server::{tool_definitions, McpServer};
