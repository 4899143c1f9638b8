//! Route classification.
//!
//! Every inbound request is matched against a fixed table of method and
//! exact path. There is no prefix or substring matching: `/v1/chat` or
//! `/api/chat/completions` are unrecognized.

use axum::http::Method;

pub const HEALTH_PATH: &str = "/health";
pub const MODELS_PATH: &str = "/v1/models";
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,
    ModelsList,
    ChatCompletion,
    Unrecognized,
}

impl Route {
    pub fn classify(method: &Method, path: &str) -> Self {
        match (method, path) {
            (&Method::GET, HEALTH_PATH) => Route::Health,
            (&Method::GET, MODELS_PATH) => Route::ModelsList,
            (&Method::POST, CHAT_COMPLETIONS_PATH) => Route::ChatCompletion,
            _ => Route::Unrecognized,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::ModelsList => "models",
            Route::ChatCompletion => "chat_completion",
            Route::Unrecognized => "unrecognized",
        }
    }
}
