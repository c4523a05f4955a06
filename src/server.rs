use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{delete, get, post},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;

use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::config::UiConfig;
use crate::llm::Message;
use crate::normalized::{NormalizedEvent, event_name};
use crate::session::{Session, SessionState, SessionStore};
use crate::ui;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/chat", post(api_chat))
        .route("/api/chat/stream", get(api_chat_stream))
        .route("/api/tools", get(api_tools))
        .route("/api/sessions/{id}/messages", get(api_get_messages))
        .route("/api/sessions/{id}", delete(api_clear_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Address a browser on this machine can reach the server at.
fn browser_url(ui: &UiConfig) -> String {
    let host = match ui.server_name.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    };
    format!("http://{host}:{}", ui.server_port)
}

/// Bind `ui.server_name:ui.server_port` and serve until the process exits.
pub async fn start_server(ui: &UiConfig, state: AppState) -> anyhow::Result<()> {
    let sessions = state.sessions.clone();
    let app = router(state);

    let addr = format!("{}:{}", ui.server_name, ui.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    if ui.share {
        tracing::warn!(
            name: "server.share.unsupported",
            "Public share links are not supported; serving locally only"
        );
    }

    spawn_session_sweeper(sessions);

    if ui.launch_browser {
        let url = browser_url(ui);
        if let Err(e) = open::that(&url) {
            tracing::warn!(name: "server.browser.failed", url = %url, error = %e, "Failed to open browser");
        }
    }

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Periodically drop sessions that have been idle past the store's timeout.
fn spawn_session_sweeper(sessions: SessionStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sessions.timeout().max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            sessions.cleanup_expired();
        }
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET / - Chat page.
async fn index(State(state): State<AppState>) -> Html<String> {
    Html(ui::render_page(&state.ui))
}

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// User message content.
    message: String,
    /// Optional session ID (creates new if not provided).
    #[serde(default)]
    session_id: Option<String>,
}

/// Transcript after a chat turn.
#[derive(Debug, Serialize)]
struct ChatResponse {
    session_id: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn resolve_session(state: &AppState, session_id: Option<&str>) -> Session {
    match session_id.filter(|id| !id.is_empty()) {
        Some(id) => state.sessions.get_or_create(id),
        None => state.sessions.create(),
    }
}

/// POST /api/chat - Run one agent turn and return the updated transcript.
async fn api_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let session = resolve_session(&state, req.session_id.as_deref());

    tracing::info!(
        name: "chat.request",
        session_id = %session.id(),
        message_length = req.message.len(),
        "Received chat request"
    );

    let error = match run_turn(&state, &session, req.message).await {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(name: "chat.failed", session_id = %session.id(), error = %e, "Chat turn failed");
            Some(format!("Error: {e}"))
        }
    };

    Json(ChatResponse {
        session_id: session.id().to_string(),
        messages: session.messages(),
        error,
    })
}

async fn run_turn(state: &AppState, session: &Session, message: String) -> crate::error::Result<()> {
    state.registry.connect_all().await?;

    let turn = session.begin_turn(message);
    let outcome = state.agent.run(session.messages()).await?;
    turn.complete(outcome.final_output);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

fn sse_frame(event: &NormalizedEvent) -> Result<Event, Infallible> {
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Ok(Event::default().event(event_name(event)).data(json))
}

/// GET /api/chat/stream - Run one agent turn as a stream of events.
///
/// The user message is recorded when the turn starts and taken back out if
/// the turn ends in an error or the client disconnects.
async fn api_chat_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    let session = resolve_session(&state, query.session_id.as_deref());

    tracing::info!(
        name: "chat.stream.request",
        session_id = %session.id(),
        message_length = query.message.len(),
        "Received streaming chat request"
    );

    let stream = async_stream::stream! {
        if let Err(e) = state.registry.connect_all().await {
            yield sse_frame(&NormalizedEvent::Error { message: e.to_string(), code: None });
            return;
        }

        // Dropping the turn, including when the client goes away, takes the
        // user message back out of the transcript.
        let mut turn = Some(session.begin_turn(query.message));
        let events = match state.agent.run_streamed(session.messages()).await {
            Ok(events) => events,
            Err(e) => {
                drop(turn.take());
                yield sse_frame(&NormalizedEvent::Error { message: e.to_string(), code: None });
                return;
            }
        };

        let mut output = String::new();
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            match &event {
                NormalizedEvent::MessageDelta { text } => output.push_str(text),
                NormalizedEvent::ToolResult { .. } => output.clear(),
                NormalizedEvent::Error { .. } => drop(turn.take()),
                NormalizedEvent::Done => {
                    if let Some(turn) = turn.take() {
                        turn.complete(std::mem::take(&mut output));
                    }
                }
                _ => {}
            }
            yield sse_frame(&event);
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Tools panel contents.
#[derive(Debug, Serialize)]
struct ToolsResponse {
    markdown: String,
}

/// GET /api/tools - Markdown listing of every tool on every server.
async fn api_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    let listing = match state.registry.connect_all().await {
        Ok(()) => state.registry.list_all_tools().await,
        Err(e) => Err(e),
    };

    let markdown = match listing {
        Ok(tools) => ui::render_tools_listing(&tools),
        Err(e) => {
            tracing::error!(name: "tools.list.failed", error = %e, "Failed to list tools");
            ui::render_tools_error(&e)
        }
    };

    Json(ToolsResponse { markdown })
}

/// GET /api/sessions/:id/messages - Get session transcript.
async fn api_get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionState>, StatusCode> {
    state
        .sessions
        .get(&id)
        .map(|session| Json(session.to_state()))
        .ok_or(StatusCode::NOT_FOUND)
}

/// DELETE /api/sessions/:id - Clear a tab's transcript.
async fn api_clear_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    match state.sessions.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_url_maps_wildcard_host_to_loopback() {
        let mut ui = UiConfig {
            title: String::new(),
            height: 500,
            placeholder: String::new(),
            launch_browser: false,
            share: false,
            server_name: "0.0.0.0".to_string(),
            server_port: 8082,
        };
        assert_eq!(browser_url(&ui), "http://127.0.0.1:8082");
        ui.server_name = "localhost".to_string();
        assert_eq!(browser_url(&ui), "http://localhost:8082");
    }
}
