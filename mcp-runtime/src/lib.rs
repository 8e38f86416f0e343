//! MCP adapter exposing the treasury backend's REST endpoints as tools.
//!
//! A tool call flows through four pieces: the [`registry`] (which tools exist
//! for the active [`Mode`]), the tool's shaping function in [`tools`]
//! (validation and request construction), the [`bridge`] (base URL
//! resolution via [`environment`] and exactly one HTTP call), and the
//! [`format`] module (the text content block returned to the agent).

use clap::Subcommand;
use serde_json::json;

pub mod args;
pub mod bridge;
pub mod config;
pub mod environment;
pub mod error;
pub mod format;
pub mod registry;
pub mod server;
pub mod tools;

pub use bridge::{JsonOrText, RequestBridge, RequestSpec, ResponseEnvelope, Transport};
pub use config::{RuntimeArgs, RuntimeConfig};
pub use environment::{Environment, EnvironmentResolver};
pub use format::{ToolOutput, format};
pub use registry::{Mode, Tier, ToolRegistry};
pub use server::McpServer;

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum McpCommands {
    /// Run the MCP server over stdio (default)
    Serve,
    /// Print the tool names registered for the active mode and exit
    Tools,
}

/// Run a command to completion and return the process exit code.
pub async fn run(config: RuntimeConfig, command: McpCommands) -> i32 {
    let server = match McpServer::new(&config) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "failed to build tool registry");
            return 1;
        }
    };

    match command {
        McpCommands::Serve => match server.serve_stdio().await {
            Ok(()) => 0,
            Err(err) => {
                tracing::error!(error = %err, "mcp transport failed");
                1
            }
        },
        McpCommands::Tools => {
            let payload = json!({
                "mode": config.mode.as_str(),
                "tools": server.registry().names(),
            });
            println!("{}", format::to_pretty_json(&payload));
            0
        }
    }
}
