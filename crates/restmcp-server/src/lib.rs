//! restmcp Server - the upstream tool server
//!
//! A small JSON-RPC 2.0 server over HTTP exposing a fixed set of toy tools.
//! Clients must `initialize` first; the returned `Mcp-Session-Id` header is
//! required on every later request.

pub mod calculator;
pub mod error;
pub mod registry;
pub mod resources;
pub mod server;
pub mod tools;

pub use error::{Result, ServerError};
pub use registry::{ToolHandler, ToolRegistry};
pub use server::ToolServer;
pub use tools::Ledger;

/// Port the tool server listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 9000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub port: u16,
    /// Answer with `text/event-stream` when the client accepts it
    pub stream_responses: bool,
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "restmcp-tool-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            port: DEFAULT_PORT,
            stream_responses: true,
            instructions: Some(
                "Toy tools: arithmetic, greetings, clock, JSON formatting, fake transactions and exchange rates".to_string(),
            ),
        }
    }
}

impl ServerConfig {
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.stream_responses = enabled;
        self
    }
}
