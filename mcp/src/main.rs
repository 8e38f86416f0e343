use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use treasury_mcp_runtime::{McpCommands, RuntimeArgs, run};

#[derive(Parser)]
#[command(
    name = "treasury-mcp",
    version,
    about = "Treasury MCP server — backend REST endpoints as agent tools over stdio"
)]
struct Cli {
    #[command(flatten)]
    runtime: RuntimeArgs,

    #[command(subcommand)]
    command: Option<McpCommands>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout carries protocol traffic, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treasury_mcp=info,treasury_mcp_runtime=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(McpCommands::Serve);

    let code = run(cli.runtime.into(), command).await;
    std::process::exit(code);
}
