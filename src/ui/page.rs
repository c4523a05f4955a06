//! The chat page.

use crate::config::UiConfig;

/// Render the chat page: transcript, input box, Run/Clear buttons and a
/// collapsible tools panel.
pub fn render_page(ui: &UiConfig) -> String {
    let title = html_escape::encode_text(&ui.title);
    let placeholder = html_escape::encode_double_quoted_attribute(&ui.placeholder);
    let height = ui.height;

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1.5rem; }}
#transcript {{ height: {height}px; overflow-y: auto; border: 1px solid #ccc; border-radius: 8px; padding: 0.75rem; }}
.msg {{ margin: 0.5rem 0; padding: 0.5rem 0.75rem; border-radius: 8px; white-space: pre-wrap; }}
.user {{ background: #e8f0fe; margin-left: 20%; }}
.assistant {{ background: #f1f3f4; margin-right: 20%; }}
.error {{ background: #fde8e8; color: #a00; }}
#controls {{ display: flex; gap: 0.5rem; margin-top: 0.75rem; }}
#message {{ flex: 1; padding: 0.5rem; }}
#tools {{ white-space: pre-wrap; }}
</style>
</head>
<body>
<h1>{title}</h1>
<div id="transcript"></div>
<form id="controls">
  <input id="message" name="message" placeholder="{placeholder}" autocomplete="off">
  <button type="submit" id="run">Run</button>
  <button type="button" id="clear">Clear</button>
</form>
<details id="tools-panel">
  <summary>Tools info</summary>
  <div id="tools">Loading...</div>
</details>
<script>
(() => {{
  const transcript = document.getElementById("transcript");
  const input = document.getElementById("message");
  let sessionId = sessionStorage.getItem("mcp-chat-session");

  function render(messages, error) {{
    transcript.innerHTML = "";
    for (const m of messages) {{
      const div = document.createElement("div");
      div.className = "msg " + m.role;
      div.textContent = m.content;
      transcript.appendChild(div);
    }}
    if (error) {{
      const div = document.createElement("div");
      div.className = "msg error";
      div.textContent = error;
      transcript.appendChild(div);
    }}
    transcript.scrollTop = transcript.scrollHeight;
  }}

  document.getElementById("controls").addEventListener("submit", async (e) => {{
    e.preventDefault();
    const message = input.value.trim();
    if (!message) return;
    input.value = "";
    const res = await fetch("/api/chat", {{
      method: "POST",
      headers: {{ "Content-Type": "application/json" }},
      body: JSON.stringify({{ message, session_id: sessionId }}),
    }});
    const body = await res.json();
    sessionId = body.session_id;
    sessionStorage.setItem("mcp-chat-session", sessionId);
    render(body.messages, body.error);
  }});

  document.getElementById("clear").addEventListener("click", async () => {{
    if (sessionId) await fetch("/api/sessions/" + sessionId, {{ method: "DELETE" }});
    sessionId = null;
    sessionStorage.removeItem("mcp-chat-session");
    render([], null);
  }});

  document.getElementById("tools-panel").addEventListener("toggle", async (e) => {{
    if (!e.target.open) return;
    const res = await fetch("/api/tools");
    const body = await res.json();
    document.getElementById("tools").textContent = body.markdown;
  }});

  if (sessionId) {{
    fetch("/api/sessions/" + sessionId + "/messages")
      .then((r) => (r.ok ? r.json() : {{ messages: [] }}))
      .then((body) => render(body.messages, null));
  }}
}})();
</script>
</body>
</html>
"#
    )
}
