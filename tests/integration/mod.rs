//! Integration tests: the server against a real database file, the MCP
//! loop over in-memory pipes, and the Gemini client against a local HTTP
//! server.

mod basic_integration;
mod gemini_http;
mod mcp_flow;
