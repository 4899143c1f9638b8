use super::paragraphs::cap_paragraphs;
use super::types::{ChatResponse, ResponseChoice, ResponseMessage, UpstreamResponse, Usage};
use chrono::Utc;
use serde_json::Value;

/// Reshape an upstream completion into the caller-facing envelope.
/// Pure apart from the clock: `caller_model` is the name the client asked
/// for and is echoed back instead of the upstream identifier.
pub fn reshape(
    resp: &UpstreamResponse,
    caller_model: &str,
    paragraph_cap: Option<usize>,
) -> ChatResponse {
    let now = Utc::now();

    let choices = resp
        .choices
        .iter()
        .enumerate()
        .map(|(position, choice)| {
            let message = choice.message.as_ref();
            let content = message
                .and_then(|m| m.content.as_deref())
                .unwrap_or_default();
            let content = match paragraph_cap {
                Some(max) => cap_paragraphs(content, max).into_owned(),
                None => content.to_string(),
            };

            ResponseChoice {
                index: position as u64,
                message: ResponseMessage {
                    role: message
                        .and_then(|m| m.role.clone())
                        .unwrap_or_else(|| "assistant".to_string()),
                    content,
                },
                finish_reason: choice
                    .finish_reason
                    .clone()
                    .unwrap_or_else(|| "stop".to_string()),
            }
        })
        .collect();

    ChatResponse {
        id: format!("chatcmpl-{}", now.timestamp_millis()),
        object: "chat.completion".to_string(),
        created: now.timestamp(),
        model: caller_model.to_string(),
        choices,
        usage: resp.usage.clone().unwrap_or_default(),
    }
}

/// Pull a human-readable message out of an upstream error body.
///
/// Providers disagree on the shape: NIM uses `{"detail": ...}`, OpenAI-style
/// services `{"error": {"message": ...}}`, others a bare `error` or
/// `message` string. Falls back to the (truncated) raw body.
pub fn upstream_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let candidates = [
            json.get("detail"),
            json.pointer("/error/message"),
            json.get("error"),
            json.get("message"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(s) = candidate.as_str() {
                if !s.is_empty() {
                    return s.to_string();
                }
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        "Upstream returned an empty error body".to_string()
    } else {
        truncate(body, 500).to_string()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
