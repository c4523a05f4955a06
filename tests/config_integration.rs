use mcp_agent_chat::config::AppConfig;
use mcp_agent_chat::error::AppError;
use mcp_agent_chat::mcp::ServerKind;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("MCP_CHAT_CHAT__MAX_TURNS");
        env::remove_var("MCP_CHAT_UI__SERVER_PORT");
        env::remove_var("MCP_CHAT_MODEL__NAME");
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("Failed to create temp config");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp config");
    file
}

const MINIMAL: &str = r#"{
    "model": { "name": "gpt-4o-mini", "api_key": "OPENAI_API_KEY" }
}"#;

#[test]
#[serial]
fn test_defaults_fill_missing_sections() {
    clear_env_vars();
    let file = write_config(MINIMAL);

    let config = AppConfig::load(file.path()).expect("Failed to load config");

    assert_eq!(config.model.name, "gpt-4o-mini");
    assert_eq!(config.model.provider, "openai");
    assert!(config.model.url.is_none());
    assert_eq!(config.model.api_key, "OPENAI_API_KEY");
    assert!(config.mcp_servers.is_empty());
    assert_eq!(config.chat.max_turns, 30);
    assert_eq!(config.chat.agent_name, "Assistant");
    assert_eq!(config.chat.agent_instructions, "You are a helpful assistant.");
    assert_eq!(config.ui.title, "MCP Agent Chat");
    assert_eq!(config.ui.height, 500);
    assert_eq!(config.ui.placeholder, "Chat with our AI Assistant:");
    assert!(config.ui.launch_browser);
    assert!(!config.ui.share);
    assert_eq!(config.ui.server_name, "127.0.0.1");
    assert_eq!(config.ui.server_port, 8082);
}

#[test]
#[serial]
fn test_full_file_load() {
    clear_env_vars();
    let file = write_config(
        r#"{
        "model": {
            "name": "qwen2.5:7b",
            "provider": "ollama",
            "url": "http://localhost:11434/v1",
            "api_key": "ollama"
        },
        "mcp_servers": [
            { "command": "python", "args": ["servers/date_mcp_server.py"] },
            { "type": "http", "url": "http://localhost:9000/mcp", "timeout": 30 }
        ],
        "chat": { "max_turns": 5, "agent_name": "Helper" },
        "ui": { "server_port": 7070, "launch_browser": false }
    }"#,
    );

    let config = AppConfig::load(file.path()).expect("Failed to load config from file");

    assert_eq!(config.model.provider, "ollama");
    assert_eq!(config.model.url.as_deref(), Some("http://localhost:11434/v1"));
    assert_eq!(config.mcp_servers.len(), 2);
    assert_eq!(config.mcp_servers[0].kind, ServerKind::Stdio);
    assert_eq!(config.mcp_servers[0].timeout, 120);
    assert_eq!(config.mcp_servers[1].kind, ServerKind::Http);
    assert_eq!(config.mcp_servers[1].timeout, 30);
    assert_eq!(config.chat.max_turns, 5);
    assert_eq!(config.chat.agent_name, "Helper");
    assert_eq!(config.ui.server_port, 7070);
    assert!(!config.ui.launch_browser);
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("MCP_CHAT_CHAT__MAX_TURNS", "7");
        env::set_var("MCP_CHAT_UI__SERVER_PORT", "9090");
    }
    let file = write_config(MINIMAL);

    let config = AppConfig::load(file.path()).expect("Failed to load config");
    assert_eq!(config.chat.max_turns, 7);
    assert_eq!(config.ui.server_port, 9090);

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_api_key_is_configuration_error() {
    clear_env_vars();
    let file = write_config(r#"{ "model": { "name": "gpt-4o-mini" } }"#);

    let err = AppConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)), "got {err:?}");
}

#[test]
#[serial]
fn test_missing_file_is_configuration_error() {
    clear_env_vars();
    let err = AppConfig::load("does/not/exist.json").unwrap_err();
    assert!(matches!(err, AppError::Configuration(ref msg) if msg.contains("does/not/exist.json")));
}

#[test]
#[serial]
fn test_malformed_json_is_configuration_error() {
    clear_env_vars();
    let file = write_config(r#"{ "model": { "name": "x", "api_key": "k" "#);

    let err = AppConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
}

#[test]
#[serial]
fn test_invalid_server_definitions_are_rejected() {
    clear_env_vars();
    for servers in [
        r#"[{ "type": "stdio", "args": ["x.py"] }]"#,
        r#"[{ "type": "http" }]"#,
        r#"[{ "type": "sse", "url": "http://localhost:9000" }]"#,
    ] {
        let file = write_config(&format!(
            r#"{{ "model": {{ "name": "m", "api_key": "k" }}, "mcp_servers": {servers} }}"#
        ));
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)), "{servers}: {err:?}");
    }
}

#[test]
#[serial]
fn test_zero_max_turns_is_rejected() {
    clear_env_vars();
    let file = write_config(
        r#"{ "model": { "name": "m", "api_key": "k" }, "chat": { "max_turns": 0 } }"#,
    );
    let err = AppConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
}

#[test]
#[serial]
fn test_shipped_configs_load() {
    clear_env_vars();
    for (path, _) in mcp_agent_chat::config::EXAMPLE_CONFIGS {
        let config = AppConfig::load(path).unwrap_or_else(|e| panic!("{path}: {e}"));
        assert!(!config.mcp_servers.is_empty(), "{path}");
    }
}
