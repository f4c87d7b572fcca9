//! Flowgate HTTP gateway entry point.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use flowgate::types::{
    InitializeResult, ResourceContent, ResourceDefinition, ToolCallResult, ToolDefinition,
};
use flowgate::{CapabilitySet, StaticCatalog};
use flowgate_http::{load_config, HttpTransport};

#[derive(Parser)]
#[command(
    name = "flowgate-http",
    about = "Gateway serving JSON-RPC tool invocation over Streamable HTTP and legacy SSE",
    version
)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default).
    Serve {
        /// Listen address override, host:port.
        #[arg(long)]
        addr: Option<String>,

        /// Configuration file path.
        #[arg(short, long)]
        config: Option<String>,

        /// Log level (trace, debug, info, warn, error).
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Validate a configuration file.
    Check {
        /// Configuration file path.
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print server capabilities as JSON.
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Serve {
        addr: None,
        config: None,
        log_level: None,
    }) {
        Commands::Serve {
            addr,
            config,
            log_level: _,
        } => {
            let mut config = load_config(config.or(cli.config).as_deref())?;
            if let Some(addr) = addr {
                let (host, port) = addr
                    .rsplit_once(':')
                    .ok_or_else(|| anyhow::anyhow!("--addr must be host:port, got {addr}"))?;
                config.host = host.to_string();
                config.port = port.parse()?;
            }

            let transport = HttpTransport::new(config, builtin_catalog());
            let token = transport.shutdown_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, draining");
                    token.cancel();
                }
            });
            transport.run().await?;
        }

        Commands::Check { config } => {
            match load_config(config.or(cli.config).as_deref()) {
                Ok(config) => {
                    println!("Valid configuration");
                    println!("  Bind: {}", config.bind_addr());
                    println!("  Turn timeout: {}s", config.request_timeout_secs);
                    println!("  Origin enforcement: {}", config.enforce_origin);
                    println!("  Auth tokens: {}", config.auth_tokens.len());
                }
                Err(e) => {
                    eprintln!("Invalid configuration: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Info => {
            let capabilities = InitializeResult::default_result();
            let info = json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

/// Demo capability set served by the standalone binary. Embedders supply
/// their own through [`HttpTransport::new`].
fn builtin_catalog() -> Arc<dyn CapabilitySet> {
    let catalog = StaticCatalog::new()
        .tool(
            ToolDefinition {
                name: "echo".to_string(),
                description: Some("Echo the provided text back to the caller".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "text": {"type": "string", "description": "Text to echo"}
                    },
                    "required": ["text"]
                }),
            },
            |arguments| async move {
                let text = arguments
                    .and_then(|args| args.get("text").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_default();
                Ok(ToolCallResult::text(text))
            },
        )
        .resource(
            ResourceDefinition {
                uri: "flowgate://about".to_string(),
                name: "About".to_string(),
                description: Some("Gateway build information".to_string()),
                mime_type: Some("text/plain".to_string()),
            },
            ResourceContent::text(
                "flowgate://about",
                format!("flowgate {}", env!("CARGO_PKG_VERSION")),
            ),
        );
    Arc::new(catalog)
}
