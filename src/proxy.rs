use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::translate::response::upstream_error_message;
use crate::translate::types::{UpstreamRequest, UpstreamResponse};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// Raw upstream event-stream bytes, relayed without modification.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send>>;

/// Forward a request and wait for the complete upstream body.
pub async fn proxy_buffered(
    req: &UpstreamRequest,
    config: &ProxyConfig,
    api_key: Option<&str>,
    client: &reqwest::Client,
) -> Result<UpstreamResponse> {
    let response = send(req, config, api_key, client).await?;

    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| {
        ProxyError::upstream(None, format!("Failed to read upstream response body: {e}"))
    })?;

    tracing::debug!(status, body_len = body.len(), "Upstream response");

    serde_json::from_str(&body).map_err(|e| {
        ProxyError::upstream(
            Some(status),
            format!("Failed to parse upstream response: {e}"),
        )
    })
}

/// Forward a request in streaming mode and hand back the upstream bytes as
/// they arrive.
pub async fn proxy_streaming(
    req: &UpstreamRequest,
    config: &ProxyConfig,
    api_key: Option<&str>,
    client: &reqwest::Client,
) -> Result<ByteStream> {
    let response = send(req, config, api_key, client).await?;
    Ok(Box::pin(relay(response.bytes_stream())))
}

/// Refuse to go upstream without a key.
pub fn require_api_key<'a>(config: &ProxyConfig, api_key: Option<&'a str>) -> Result<&'a str> {
    api_key.ok_or_else(|| {
        ProxyError::config(format!(
            "API key not configured (set {})",
            config.upstream.api_key_env
        ))
    })
}

/// POST the request upstream. Non-2xx statuses come back as
/// `ProxyError::Upstream` carrying the upstream status and message.
async fn send(
    req: &UpstreamRequest,
    config: &ProxyConfig,
    api_key: Option<&str>,
    client: &reqwest::Client,
) -> Result<reqwest::Response> {
    let api_key = require_api_key(config, api_key)?;
    let url = config.chat_completions_url();

    tracing::info!(
        url = %url,
        model = %req.model,
        stream = req.stream,
        messages = req.messages.len(),
        "Forwarding to upstream"
    );

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(req)
        .send()
        .await
        .map_err(|e| ProxyError::upstream(None, format!("Request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = upstream_error_message(&body);
        tracing::warn!(status = status.as_u16(), %message, "Upstream returned an error");
        return Err(ProxyError::upstream(Some(status.as_u16()), message));
    }

    Ok(response)
}

/// Pass upstream chunks through untouched. A transport error ends the
/// stream with an error so the client connection is torn down.
fn relay(
    byte_stream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + 'static {
    async_stream::stream! {
        tokio::pin!(byte_stream);
        let mut relayed = 0usize;

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    relayed += bytes.len();
                    yield Ok(bytes);
                }
                Err(e) => {
                    tracing::error!(error = %e, relayed, "Upstream stream failed");
                    yield Err(std::io::Error::other(e));
                    break;
                }
            }
        }

        tracing::info!(bytes = relayed, "Stream completed");
    }
}
