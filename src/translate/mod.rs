//! Translation between the caller-facing OpenAI format and the upstream
//! provider's payloads.
//!
//! Builds upstream requests, reshapes upstream responses and applies the
//! optional paragraph cap. All functions here are pure (no I/O).

pub mod paragraphs;
pub mod request;
pub mod response;
pub mod types;
