//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the parts of the MCP specification needed to
//! expose tools and prompts to AI assistants. Sessions speak JSON-RPC 2.0
//! over newline-delimited stdio or TCP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │  Transport  │───▶│   Server    │───▶│  Registry   │    │
//! │   │ (stdio/tcp) │    │ (lifecycle) │    │ (handlers)  │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │          │                  │                  │            │
//! │          ▼                  ▼                  ▼            │
//! │   ┌─────────────────────────────────────────────────┐      │
//! │   │              JSON-RPC Messages                  │      │
//! │   └─────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! Targets MCP protocol version 2025-06-18 and accepts 2025-03-26 and
//! 2024-11-05.

pub mod handler;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use handler::{HandlerError, PromptHandler, ToolHandler};
pub use protocol::{ErrorObject, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use registry::CapabilityRegistry;
pub use server::{McpServer, ServerContext, SessionState};
pub use transport::{LineTransport, StdioTransport, TcpTransport};
