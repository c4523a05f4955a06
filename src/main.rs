//! MCP Agent Chat server.
//!
//! Entry point: parses the CLI, loads the configuration, assembles the agent
//! and serves the chat page.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv_override;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_agent_chat::AppState;
use mcp_agent_chat::agent::Agent;
use mcp_agent_chat::config::{AppConfig, Cli, DEFAULT_CONFIG_PATH, EXAMPLE_CONFIGS};
use mcp_agent_chat::llm::{ChatCompletionsDriver, LlmDriver, build_client, resolve_api_key};
use mcp_agent_chat::mcp::McpRegistry;
use mcp_agent_chat::server::start_server;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing (M-LOG-STRUCTURED)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load .env (if present); its values replace inherited ones.
    let _ = dotenv_override();

    let cli = Cli::parse();

    if cli.list_configs {
        println!("Available example configurations:");
        for (path, description) in EXAMPLE_CONFIGS {
            println!("  {path} {description}");
        }
        return ExitCode::SUCCESS;
    }

    if !cli.config.exists() {
        println!(
            "Error: Configuration file '{}' not found.",
            cli.config.display()
        );
        println!("Available configurations:");
        for (path, _) in EXAMPLE_CONFIGS {
            if *path == DEFAULT_CONFIG_PATH {
                println!("  {path} (default)");
            } else {
                println!("  {path}");
            }
        }
        println!("\nUse --list-configs to see details.");
        return ExitCode::FAILURE;
    }

    println!(
        "Starting MCP Agent Chat with config: {}",
        cli.config.display()
    );

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error starting interface: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.config)?;
    let api_key = resolve_api_key(&config.model.api_key)?;

    let registry = McpRegistry::build_from_config(&config.mcp_servers)?;
    let client = build_client(config.model.url.as_deref(), api_key);

    info!(
        name: "llm.config.loaded",
        base_url = %client.base_url(),
        model = %config.model.name,
        provider = %config.model.provider,
        detected_provider = %client.provider(),
        "LLM configuration loaded"
    );

    println!("Model: {}", config.model.name);
    println!("Provider: {}", config.model.provider);
    println!("MCP Servers: {}", registry.len());

    let driver: Arc<dyn LlmDriver> =
        Arc::new(ChatCompletionsDriver::new(client, config.model.name.clone()));
    let agent = Agent::assemble(&config.chat, driver, registry);

    let state = AppState::new(agent, config.ui.clone());
    start_server(&config.ui, state).await
}
