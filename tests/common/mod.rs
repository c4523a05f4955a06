//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcp_agent_chat::llm::{EventStream, LlmDriver, LlmRequest};
use mcp_agent_chat::mcp::{Connector, ServerDefinition, ToolServerSession};
use mcp_agent_chat::normalized::NormalizedEvent;
use rmcp::model::{JsonObject, Tool};

/// Behaviour of one fake tool server.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    pub tools: Vec<String>,
    pub fail_connect: bool,
    pub fail_list: bool,
    pub fail_calls: bool,
    /// Answer calls with an `isError` result instead of failing the request.
    pub report_errors: bool,
}

impl FakeServer {
    pub fn with_tools(tools: &[&str]) -> Self {
        Self {
            tools: tools.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }
}

/// A tool invocation observed by a fake server.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub server: String,
    pub tool: String,
    pub arguments: Option<JsonObject>,
}

/// Connector that serves scripted tool servers keyed by the last launch
/// argument (stdio) or the url (http).
#[derive(Debug, Default)]
pub struct FakeConnector {
    servers: HashMap<String, FakeServer>,
    connects: Mutex<HashMap<String, usize>>,
    total_connects: AtomicUsize,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    connect_delay: Option<Duration>,
}

pub fn server_key(def: &ServerDefinition) -> String {
    def.url
        .clone()
        .or_else(|| def.args.last().cloned())
        .or_else(|| def.command.clone())
        .unwrap_or_default()
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(mut self, key: &str, server: FakeServer) -> Self {
        self.servers.insert(key.to_string(), server);
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn connects_for(&self, key: &str) -> usize {
        self.connects.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_connects(&self) -> usize {
        self.total_connects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        definition: &ServerDefinition,
    ) -> anyhow::Result<Arc<dyn ToolServerSession>> {
        let key = server_key(definition);
        self.total_connects.fetch_add(1, Ordering::SeqCst);
        *self.connects.lock().unwrap().entry(key.clone()).or_default() += 1;

        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        let server = self
            .servers
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such server: {key}"))?;
        if server.fail_connect {
            anyhow::bail!("connection refused");
        }

        Ok(Arc::new(FakeSession {
            key,
            server,
            calls: Arc::clone(&self.calls),
        }))
    }
}

#[derive(Debug)]
struct FakeSession {
    key: String,
    server: FakeServer,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

pub fn tool(name: &str) -> Tool {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "description": format!("{name} tool"),
        "inputSchema": { "type": "object", "properties": {} }
    }))
    .unwrap()
}

#[async_trait]
impl ToolServerSession for FakeSession {
    async fn list_tools(&self) -> anyhow::Result<Vec<Tool>> {
        if self.server.fail_list {
            anyhow::bail!("tools/list failed");
        }
        Ok(self.server.tools.iter().map(|t| tool(t)).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> anyhow::Result<serde_json::Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            server: self.key.clone(),
            tool: name.to_string(),
            arguments,
        });
        if self.server.fail_calls {
            anyhow::bail!("tool exploded");
        }
        if self.server.report_errors {
            return Ok(serde_json::json!({
                "content": [{ "type": "text", "text": format!("{name}: bad input") }],
                "isError": true
            }));
        }
        Ok(serde_json::json!({
            "content": [{ "type": "text", "text": format!("{name} result") }],
            "isError": false
        }))
    }
}

/// A request as seen by the fake driver.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<serde_json::Value>,
    pub tools: Vec<serde_json::Value>,
}

/// Driver that replays scripted responses, one per model call.
#[derive(Debug, Default)]
pub struct FakeDriver {
    responses: Mutex<VecDeque<anyhow::Result<Vec<NormalizedEvent>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    repeat_last: Option<Vec<NormalizedEvent>>,
}

impl FakeDriver {
    pub fn new(responses: Vec<Vec<NormalizedEvent>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Answer every call with the same events.
    pub fn always(events: Vec<NormalizedEvent>) -> Self {
        Self {
            repeat_last: Some(events),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(anyhow::anyhow!(message.to_string()))])),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmDriver for FakeDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: req.messages,
            tools: req.tools,
        });

        let next = self.responses.lock().unwrap().pop_front();
        let events = match (next, &self.repeat_last) {
            (Some(result), _) => result?,
            (None, Some(events)) => events.clone(),
            (None, None) => anyhow::bail!("no scripted response left"),
        };

        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

/// A plain text answer.
pub fn text_response(text: &str) -> Vec<NormalizedEvent> {
    vec![
        NormalizedEvent::MessageDelta {
            text: text.to_string(),
        },
        NormalizedEvent::Done,
    ]
}

/// A single tool call followed by the end of the model's output.
pub fn tool_call_response(id: &str, name: &str, arguments: &str) -> Vec<NormalizedEvent> {
    vec![
        NormalizedEvent::ToolCallDelta {
            call_index: 0,
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            arguments_delta: Some(arguments.to_string()),
        },
        NormalizedEvent::ToolCallComplete {
            call_index: 0,
            id: id.to_string(),
            name: name.to_string(),
            arguments_json: arguments.to_string(),
        },
        NormalizedEvent::Done,
    ]
}

pub fn date_server_def() -> ServerDefinition {
    ServerDefinition::stdio("python", ["/a/b/date_mcp_server.py"])
}

pub fn pvc_server_def() -> ServerDefinition {
    ServerDefinition::stdio("python", ["/a/b/pvc_company.py"])
}

/// Connector with the date and product servers used across the tests.
pub fn two_server_connector() -> FakeConnector {
    FakeConnector::new()
        .server(
            "/a/b/date_mcp_server.py",
            FakeServer::with_tools(&["get_date", "get_time_for_user"]),
        )
        .server("/a/b/pvc_company.py", FakeServer::with_tools(&["get_products"]))
}
