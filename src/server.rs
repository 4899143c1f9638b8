use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::models::ModelMapping;
use crate::proxy::{self, ByteStream};
use crate::routes::Route;
use crate::search::{SearchAugmenter, SearchError, SearchOutcome};
use crate::translate::request::{build_upstream_request, inject_search_context, search_query};
use crate::translate::response::reshape;
use crate::translate::types::{ChatMessage, ChatRequest};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct AppState {
    pub config: ProxyConfig,
    pub mapping: ModelMapping,
    /// Upstream key, resolved once at startup. `None` means chat requests
    /// are refused with a configuration error.
    pub api_key: Option<String>,
    pub client: reqwest::Client,
    pub search: Option<SearchAugmenter>,
}

impl AppState {
    /// Build the state from a validated config, reading keys from the
    /// environment.
    pub fn new(config: ProxyConfig, client: reqwest::Client) -> Self {
        let mapping = ModelMapping::from_config(&config);
        let api_key = config.resolve_api_key();
        let search = SearchAugmenter::from_config(client.clone(), &config);
        Self {
            config,
            mapping,
            api_key,
            client,
            search,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .fallback(dispatch)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Single entry point: classify the request, then hand it to its handler.
async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    let route = Route::classify(&method, uri.path());
    let span = tracing::info_span!(
        "request",
        id = %request_id,
        route = route.name(),
        method = %method,
        path = uri.path()
    );

    let mut response = async {
        match route {
            Route::Health => handle_health(&state).into_response(),
            Route::ModelsList => handle_models(&state).into_response(),
            Route::ChatCompletion => handle_chat(Arc::clone(&state), &body).await,
            Route::Unrecognized => {
                tracing::warn!("Unrecognized route");
                ProxyError::route_not_found(method.as_str(), uri.path()).into_response()
            }
        }
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn handle_chat(state: Arc<AppState>, body: &[u8]) -> Response {
    match chat_completion(state, body).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!(error = %e, "Chat completion failed");
            e.into_response()
        }
    }
}

async fn chat_completion(state: Arc<AppState>, body: &[u8]) -> Result<Response> {
    let api_key = state.api_key.as_deref();
    proxy::require_api_key(&state.config, api_key)?;

    let req: ChatRequest = serde_json::from_slice(body)
        .map_err(|e| ProxyError::invalid_request(format!("Invalid request body: {e}")))?;

    let mut upstream_req = build_upstream_request(&req, &state.mapping, &state.config.upstream)?;
    let caller_model = req
        .model_name()
        .map_or_else(|| state.config.response.default_model_name.clone(), str::to_string);

    tracing::info!(
        model = %caller_model,
        upstream_model = %upstream_req.model,
        stream = upstream_req.stream,
        "Chat completion request"
    );

    if let Some(search) = &state.search {
        augment_with_search(search, &mut upstream_req.messages).await;
    }

    if upstream_req.stream {
        let stream =
            proxy::proxy_streaming(&upstream_req, &state.config, api_key, &state.client).await?;
        return Ok(event_stream_response(stream));
    }

    let upstream =
        proxy::proxy_buffered(&upstream_req, &state.config, api_key, &state.client).await?;
    let resp = reshape(&upstream, &caller_model, state.config.response.paragraph_cap);

    tracing::info!(
        choices = resp.choices.len(),
        prompt_tokens = resp.usage.prompt_tokens,
        completion_tokens = resp.usage.completion_tokens,
        "Completed"
    );

    Ok(Json(resp).into_response())
}

/// Search on the last user message and inject the results. Every failure
/// mode is soft: the request goes ahead without extra context.
async fn augment_with_search(search: &SearchAugmenter, messages: &mut Vec<ChatMessage>) {
    let Some(query) = search_query(messages) else {
        return;
    };

    match search.search(&query).await {
        Ok(SearchOutcome::Results(results)) => {
            inject_search_context(messages, &query, &results);
            tracing::info!("Added web search context");
        }
        Ok(SearchOutcome::NoResults) => {
            tracing::debug!("Search returned no results");
        }
        Err(e @ SearchError::RateLimited { .. }) => {
            tracing::debug!(error = %e, "Skipping search");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Continuing without search context");
        }
    }
}

fn event_stream_response(stream: ByteStream) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn handle_health(state: &AppState) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "api_key": state.api_key.is_some(),
        "paragraph_cap": state.config.response.paragraph_cap,
        "search_enabled": state.search.is_some(),
        "available_models": state.mapping.names(),
    }))
}

fn handle_models(state: &AppState) -> Json<crate::translate::types::ModelList> {
    let owned_by = format!("{}-proxy", state.config.upstream.name);
    Json(state.mapping.model_list(&owned_by))
}
