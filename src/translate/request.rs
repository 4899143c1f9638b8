use super::types::{ChatMessage, ChatRequest, UpstreamRequest};
use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};
use crate::models::ModelMapping;

/// Build the upstream request body from a caller request.
///
/// The caller's model name is resolved through `mapping`; a request without
/// a model goes to the mapping's default. Temperature and max tokens fall
/// back to the configured defaults only when absent.
pub fn build_upstream_request(
    req: &ChatRequest,
    mapping: &ModelMapping,
    upstream: &UpstreamConfig,
) -> Result<UpstreamRequest> {
    let messages = req
        .messages
        .clone()
        .ok_or_else(|| ProxyError::invalid_request("Missing required field: messages"))?;

    let model = match req.model_name() {
        Some(name) => mapping.resolve(name),
        None => mapping.default_model(),
    };

    Ok(UpstreamRequest {
        model: model.to_string(),
        messages,
        temperature: req.temperature.unwrap_or(upstream.default_temperature),
        max_tokens: req.max_tokens.unwrap_or(upstream.default_max_tokens),
        stream: req.is_streaming(),
    })
}

/// Longest query the search backend accepts, in words and in characters.
pub const MAX_QUERY_WORDS: usize = 50;
pub const MAX_QUERY_CHARS: usize = 400;

/// Text of the most recent `user` message.
pub fn last_user_text(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .and_then(ChatMessage::text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Search query for the conversation: the last user message, whitespace
/// collapsed and cut to the backend's word and character limits.
pub fn search_query(messages: &[ChatMessage]) -> Option<String> {
    let text = last_user_text(messages)?;
    let mut query = String::new();
    for word in text.split_whitespace().take(MAX_QUERY_WORDS) {
        let needed = word.chars().count() + usize::from(!query.is_empty());
        if query.chars().count() + needed > MAX_QUERY_CHARS {
            if query.is_empty() {
                query = word.chars().take(MAX_QUERY_CHARS).collect();
            }
            break;
        }
        if !query.is_empty() {
            query.push(' ');
        }
        query.push_str(word);
    }
    Some(query)
}

/// Insert a system message carrying search results right before the last
/// user message (or append it if there is none).
pub fn inject_search_context(messages: &mut Vec<ChatMessage>, query: &str, results: &str) {
    let context = ChatMessage::new(
        "system",
        format!("Web search results for \"{query}\":\n\n{results}"),
    );
    match messages.iter().rposition(|m| m.role == "user") {
        Some(pos) => messages.insert(pos, context),
        None => messages.push(context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;

    fn request(model: Option<&str>) -> ChatRequest {
        ChatRequest {
            model: model.map(str::to_string),
            messages: Some(vec![ChatMessage::new("user", "hi")]),
            temperature: None,
            max_tokens: None,
            stream: None,
        }
    }

    fn setup() -> (ModelMapping, UpstreamConfig) {
        let config = ProxyConfig::default();
        (ModelMapping::from_config(&config), config.upstream)
    }

    #[test]
    fn test_maps_model_and_applies_defaults() {
        let (mapping, upstream) = setup();
        let out = build_upstream_request(&request(Some("gpt-4")), &mapping, &upstream).unwrap();

        assert_eq!(out.model, "deepseek-ai/deepseek-v3.2");
        assert_eq!(out.messages.len(), 1);
        assert!((out.temperature - 0.8).abs() < f64::EPSILON);
        assert_eq!(out.max_tokens, 3000);
        assert!(!out.stream);
    }

    #[test]
    fn test_missing_model_uses_default_upstream() {
        let (mapping, upstream) = setup();
        let out = build_upstream_request(&request(None), &mapping, &upstream).unwrap();
        assert_eq!(out.model, "deepseek-ai/deepseek-r1-0528");
    }

    #[test]
    fn test_explicit_zero_temperature_is_kept() {
        let (mapping, upstream) = setup();
        let mut req = request(Some("gpt-4o"));
        req.temperature = Some(0.0);
        req.max_tokens = Some(64);
        req.stream = Some(true);

        let out = build_upstream_request(&req, &mapping, &upstream).unwrap();
        assert_eq!(out.temperature, 0.0);
        assert_eq!(out.max_tokens, 64);
        assert!(out.stream);
    }

    #[test]
    fn test_missing_messages_rejected() {
        let (mapping, upstream) = setup();
        let mut req = request(Some("gpt-4o"));
        req.messages = None;

        let err = build_upstream_request(&req, &mapping, &upstream).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest { .. }));
    }

    #[test]
    fn test_search_context_goes_before_last_user_message() {
        let mut messages = vec![
            ChatMessage::new("system", "be brief"),
            ChatMessage::new("user", "first"),
            ChatMessage::new("assistant", "ok"),
            ChatMessage::new("user", "  rust 2024 edition  "),
        ];
        let query = last_user_text(&messages).unwrap();
        assert_eq!(query, "rust 2024 edition");

        inject_search_context(&mut messages, &query, "1. Result");
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[3].role, "system");
        assert_eq!(
            messages[3].text().as_deref(),
            Some("Web search results for \"rust 2024 edition\":\n\n1. Result")
        );
        assert_eq!(messages[4].role, "user");
    }

    #[test]
    fn test_empty_model_string_uses_default_upstream() {
        let (mapping, upstream) = setup();
        let out = build_upstream_request(&request(Some("")), &mapping, &upstream).unwrap();
        assert_eq!(out.model, "deepseek-ai/deepseek-r1-0528");
    }

    #[test]
    fn test_search_query_is_cut_to_backend_limits() {
        let long_turn = (1..=120).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let messages = vec![ChatMessage::new("user", long_turn)];
        let query = search_query(&messages).unwrap();
        assert_eq!(query.split(' ').count(), MAX_QUERY_WORDS);
        assert!(query.starts_with("word1 word2 "));
        assert!(query.ends_with(" word50"));

        let wide = vec![ChatMessage::new("user", "abcdefghij ".repeat(45))];
        let query = search_query(&wide).unwrap();
        assert!(query.chars().count() <= MAX_QUERY_CHARS);
        assert_eq!(query.split(' ').count(), 36);

        let one_blob = vec![ChatMessage::new("user", "é".repeat(1000))];
        assert_eq!(search_query(&one_blob).unwrap().chars().count(), MAX_QUERY_CHARS);

        let short = vec![ChatMessage::new("user", "  rust\n\n axum  ")];
        assert_eq!(search_query(&short).as_deref(), Some("rust axum"));
    }

    #[test]
    fn test_no_user_text_no_query() {
        let messages = vec![ChatMessage::new("system", "x"), ChatMessage::new("user", "   ")];
        assert!(last_user_text(&messages).is_none());
        assert!(search_query(&messages).is_none());
    }
}
