use std::sync::Arc;

use clap::{Args, Subcommand};
use serde_json::{Value, json};

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod registry;
pub mod schema;
pub mod server;
pub mod session;
pub mod tools;

#[cfg(test)]
mod test_support;

use config::{ADMIN_EMAIL_ENV, ADMIN_PASSWORD_ENV, BackendConfig, URL_ENV};
use dispatcher::Dispatcher;
use error::BridgeError;
use registry::ToolRegistry;
use server::McpServer;
use session::Session;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "pbmcp";
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];

#[derive(Subcommand, Clone, Debug)]
pub enum McpCommands {
    /// Run the PocketBase MCP server over stdio
    Serve(McpServeArgs),
    /// Connect once, authenticate, and print the session status
    Check(ConnectionArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConnectionArgs {
    /// PocketBase base URL
    #[arg(long, env = URL_ENV)]
    pub url: Option<String>,
    /// Superuser email
    #[arg(long, env = ADMIN_EMAIL_ENV)]
    pub admin_email: Option<String>,
    /// Superuser password
    #[arg(long, env = ADMIN_PASSWORD_ENV, hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl ConnectionArgs {
    /// Without a URL the session falls back to the environment at first use,
    /// where a missing URL surfaces as a configuration error.
    fn session(&self) -> Session {
        match BackendConfig::from_parts(
            self.url.clone(),
            self.admin_email.clone(),
            self.admin_password.clone(),
        ) {
            Ok(config) => {
                tracing::info!(
                    url = %config.url,
                    admin = config.credentials.is_some(),
                    "PocketBase backend configured"
                );
                Session::new(config)
            }
            Err(err) => {
                tracing::warn!(message = %err, "PocketBase backend not configured");
                Session::from_env()
            }
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Defer connecting to PocketBase until the first tool call
    #[arg(long)]
    pub lazy_init: bool,
}

pub async fn run(command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve(args) => {
            let dispatcher = match build_dispatcher(&args.connection) {
                Ok(dispatcher) => dispatcher,
                Err(err) => return report_fatal(&err.to_payload()),
            };
            let server = McpServer::new(dispatcher);
            if !args.lazy_init {
                server.warm_up().await;
            }
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => report_fatal(&json!({
                    "error": "mcp_server_error",
                    "message": err,
                })),
            }
        }
        McpCommands::Check(args) => {
            let session = args.session();
            match session.get().await {
                Ok(handle) => {
                    println!("{}", to_pretty_json(&session.status()));
                    if handle.authenticated { 0 } else { 2 }
                }
                Err(err) => report_fatal(&err.to_payload()),
            }
        }
    }
}

fn build_dispatcher(connection: &ConnectionArgs) -> Result<Dispatcher, BridgeError> {
    let registry = ToolRegistry::builtin()?;
    Ok(Dispatcher::new(Arc::new(connection.session()), registry))
}

fn report_fatal(payload: &impl serde::Serialize) -> i32 {
    eprintln!("{}", to_pretty_json(payload));
    1
}

pub(crate) fn to_pretty_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| Value::Null.to_string())
}
