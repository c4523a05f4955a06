use crate::error::{AppError, Result};
use crate::mcp::ServerDefinition;
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.json";

/// Example configurations shipped in `configs/`, with a short description.
pub const EXAMPLE_CONFIGS: &[(&str, &str)] = &[
    ("configs/config.json", "(default) - Ollama configuration"),
    ("configs/config_openai.json", "- OpenAI configuration"),
    ("configs/config_lmstudio.json", "- LM Studio configuration"),
];

/// Instructions given to the agent when `chat.agent_instructions` is absent.
pub const DEFAULT_AGENT_INSTRUCTIONS: &str = "You are a helpful assistant.";

#[derive(Parser, Debug)]
#[command(author, version, about = "Run MCP Agent Chat Interface", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// List available example configurations
    #[arg(long)]
    pub list_configs: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub mcp_servers: Vec<ServerDefinition>,
    pub chat: ChatConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub provider: String,
    /// Custom base URL (Ollama, LM Studio, ...); the standard endpoint when absent.
    #[serde(default)]
    pub url: Option<String>,
    /// Literal key, or the name of an environment variable when upper-case.
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub max_turns: usize,
    pub agent_name: String,
    pub agent_instructions: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    pub title: String,
    pub height: u32,
    pub placeholder: String,
    pub launch_browser: bool,
    pub share: bool,
    pub server_name: String,
    pub server_port: u16,
}

impl AppConfig {
    /// Load configuration from a JSON file.
    ///
    /// Priority: `MCP_CHAT_*` environment variables > file > defaults.
    /// Nested keys use `__`, e.g. `MCP_CHAT_CHAT__MAX_TURNS=5`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::Configuration(format!(
                "Configuration file {} not found",
                path.display()
            )));
        }

        let cfg = Config::builder()
            .set_default("model.provider", "openai")?
            .set_default("chat.max_turns", 30)?
            .set_default("chat.agent_name", "Assistant")?
            .set_default("chat.agent_instructions", DEFAULT_AGENT_INSTRUCTIONS)?
            .set_default("ui.title", "MCP Agent Chat")?
            .set_default("ui.height", 500)?
            .set_default("ui.placeholder", "Chat with our AI Assistant:")?
            .set_default("ui.launch_browser", true)?
            .set_default("ui.share", false)?
            .set_default("ui.server_name", "127.0.0.1")?
            .set_default("ui.server_port", 8082)?
            .add_source(File::from(path).format(FileFormat::Json).required(true))
            .add_source(
                Environment::with_prefix("MCP_CHAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = cfg.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<()> {
        if self.model.name.trim().is_empty() {
            return Err(AppError::Configuration("model.name cannot be empty".to_string()));
        }
        if self.model.api_key.trim().is_empty() {
            return Err(AppError::Configuration("model.api_key cannot be empty".to_string()));
        }
        if self.chat.max_turns == 0 {
            return Err(AppError::Configuration("chat.max_turns must be at least 1".to_string()));
        }
        for def in &self.mcp_servers {
            def.validate()?;
        }
        Ok(())
    }
}
