pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod routes;
pub mod search;
pub mod server;
pub mod translate;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use models::ModelMapping;
pub use server::{build_router, AppState};
