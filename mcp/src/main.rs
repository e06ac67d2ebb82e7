use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pbmcp_mcp_runtime::{McpCommands, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "pbmcp",
    version,
    about = "PocketBase MCP server: collection schema and rule administration over stdio"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "PBMCP_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: McpCommands,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // stdout carries the protocol; logs go to stderr only.
    let json = cli.log_json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pbmcp_mcp=info,pbmcp_mcp_runtime=info".into()),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr)
        }))
        .init();

    let code = run_mcp(cli.command).await;
    std::process::exit(code);
}
