//! OpenAI Chat Completions API driver.
//!
//! This module implements the [`LlmDriver`] trait for the OpenAI Chat Completions
//! API (`<base>/chat/completions`), supporting streaming responses and tool calls.

use std::collections::BTreeMap;

use futures::{Stream, StreamExt};

use crate::normalized::NormalizedEvent;

use super::{EventStream, LlmDriver, LlmRequest, ModelClient};

/// Accumulated state for a streaming tool call.
#[derive(Default)]
struct ToolAccum {
    id: Option<String>,
    name: Option<String>,
    args: String,
}

/// Driver for the OpenAI Chat Completions API.
///
/// Streams responses from a [`ModelClient`] as [`NormalizedEvent`]s.
#[derive(Clone, Debug)]
pub struct ChatCompletionsDriver {
    client: ModelClient,
    model: String,
}

impl ChatCompletionsDriver {
    /// Create a driver for `model` on the given client.
    #[must_use]
    pub fn new(client: ModelClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let url = self.client.chat_url();

        let mut body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "messages": req.messages,
        });
        // Some local servers reject an empty or null tool list.
        if !req.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(req.tools);
        }

        tracing::debug!(url = %url, model = %self.model, "Sending chat completions request");

        let resp = self.client.post(&url).json(&body).send().await?.error_for_status()?;
        Ok(sse_events(resp.bytes_stream()))
    }
}

/// Turn a chat completions SSE byte stream into normalized events.
fn sse_events<S, B, E>(byte_stream: S) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let out = async_stream::try_stream! {
        let mut buf = Vec::<u8>::new();
        let mut tool_accum: BTreeMap<usize, ToolAccum> = BTreeMap::new();

        futures::pin_mut!(byte_stream);
        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            buf.extend_from_slice(chunk.as_ref());
            normalize_newlines(&mut buf);

            while let Some(pos) = find_double_newline(&buf) {
                let frame = buf.drain(..pos + 2).collect::<Vec<_>>();
                let text = String::from_utf8_lossy(&frame);

                for event in parse_frame(&text, &mut tool_accum)? {
                    yield event;
                }
            }
        }

        // The last frame may arrive without a terminating blank line.
        let rest = String::from_utf8_lossy(&buf).into_owned();
        if !rest.trim().is_empty() {
            for event in parse_frame(&rest, &mut tool_accum)? {
                yield event;
            }
        }
    };

    Box::pin(out)
}

/// Parse one SSE frame into normalized events, updating tool-call state.
fn parse_frame(
    text: &str,
    tool_accum: &mut BTreeMap<usize, ToolAccum>,
) -> anyhow::Result<Vec<NormalizedEvent>> {
    let mut events = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with("data:") {
            continue;
        }
        let data = line.trim_start_matches("data:").trim();

        if data == "[DONE]" {
            events.push(NormalizedEvent::Done);
            continue;
        }

        let v: serde_json::Value = serde_json::from_str(data)?;
        let choice = &v["choices"][0];
        let delta = &choice["delta"];

        // Assistant text delta
        if let Some(s) = delta.get("content").and_then(|x| x.as_str())
            && !s.is_empty()
        {
            events.push(NormalizedEvent::MessageDelta { text: s.to_string() });
        }

        // Tool calls streaming deltas
        if let Some(arr) = delta.get("tool_calls").and_then(|x| x.as_array()) {
            for tc in arr {
                let idx = tc
                    .get("index")
                    .and_then(serde_json::Value::as_u64)
                    .and_then(|i| usize::try_from(i).ok())
                    .unwrap_or(0);
                let id = tc.get("id").and_then(|x| x.as_str()).map(ToString::to_string);
                let function = tc.get("function");
                let name = function
                    .and_then(|f| f.get("name"))
                    .and_then(|x| x.as_str())
                    .map(ToString::to_string);
                let args_delta = function
                    .and_then(|f| f.get("arguments"))
                    .and_then(|x| x.as_str())
                    .map(ToString::to_string);

                let entry = tool_accum.entry(idx).or_default();
                if entry.id.is_none() {
                    entry.id.clone_from(&id);
                }
                if entry.name.is_none() {
                    entry.name.clone_from(&name);
                }
                if let Some(ad) = &args_delta {
                    entry.args.push_str(ad);
                }

                events.push(NormalizedEvent::ToolCallDelta {
                    call_index: idx,
                    id,
                    name,
                    arguments_delta: args_delta,
                });
            }
        }

        // Completion boundary: signal tool phase via finish_reason
        if choice.get("finish_reason").and_then(|x| x.as_str()) == Some("tool_calls") {
            for (idx, a) in tool_accum.iter() {
                if let (Some(id), Some(name)) = (&a.id, &a.name) {
                    events.push(NormalizedEvent::ToolCallComplete {
                        call_index: *idx,
                        id: id.clone(),
                        name: name.clone(),
                        arguments_json: a.args.clone(),
                    });
                }
            }
        }
    }

    Ok(events)
}

/// Rewrite CRLF line endings to LF in place.
///
/// A trailing `\r` is left alone until its `\n` arrives with the next chunk.
fn normalize_newlines(buf: &mut Vec<u8>) {
    if !buf.windows(2).any(|w| w == b"\r\n") {
        return;
    }
    let mut out = Vec::with_capacity(buf.len());
    let mut bytes = buf.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b == b'\r' && bytes.peek() == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    *buf = out;
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_delta_and_done() {
        let mut acc = BTreeMap::new();
        let events = parse_frame(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n",
            &mut acc,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                NormalizedEvent::MessageDelta { text: "Hi".to_string() },
                NormalizedEvent::Done
            ]
        );
    }

    #[test]
    fn accumulates_tool_call_across_frames() {
        let mut acc = BTreeMap::new();
        parse_frame(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_date","arguments":"{\"tz\":"}}]}}]}"#,
            &mut acc,
        )
        .unwrap();
        let events = parse_frame(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"UTC\"}"}}]},"finish_reason":"tool_calls"}]}"#,
            &mut acc,
        )
        .unwrap();

        assert_eq!(
            events.last(),
            Some(&NormalizedEvent::ToolCallComplete {
                call_index: 0,
                id: "call_1".to_string(),
                name: "get_date".to_string(),
                arguments_json: r#"{"tz":"UTC"}"#.to_string(),
            })
        );
    }

    #[test]
    fn ignores_non_data_lines() {
        let mut acc = BTreeMap::new();
        let events = parse_frame(": keep-alive\nevent: ping\n\n", &mut acc).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn finds_frame_boundary() {
        assert_eq!(find_double_newline(b"data: x\n\nrest"), Some(7));
        assert_eq!(find_double_newline(b"data: x\n"), None);
    }

    #[test]
    fn crlf_frames_are_split() {
        let mut buf = b"data: {\"choices\":[]}\r\n\r\ndata: [DONE]\r".to_vec();
        normalize_newlines(&mut buf);
        assert_eq!(find_double_newline(&buf), Some(20));
        assert!(buf.ends_with(b"[DONE]\r"));

        buf.extend_from_slice(b"\n\r\n");
        normalize_newlines(&mut buf);
        assert_eq!(buf, b"data: {\"choices\":[]}\n\ndata: [DONE]\n\n".to_vec());
    }

    #[tokio::test]
    async fn crlf_stream_with_unterminated_last_frame() {
        let chunks: Vec<std::result::Result<&'static [u8], std::io::Error>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\r".as_slice()),
            Ok(b"\n\r\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\r\n\r\n".as_slice()),
            Ok(b"data: [DONE]".as_slice()),
        ];

        let events: Vec<_> = sse_events(futures::stream::iter(chunks))
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                NormalizedEvent::MessageDelta { text: "Hel".to_string() },
                NormalizedEvent::MessageDelta { text: "lo".to_string() },
                NormalizedEvent::Done
            ]
        );
    }
}
