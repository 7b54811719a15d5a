//! twofa gate
//!
//! Axum middleware that refuses write requests from signed-in users who have
//! not configured a second factor, and a small reverse proxy that puts the
//! gate in front of the host application.

pub mod allowlist;
pub mod block;
pub mod gate;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod state;
pub mod templates;

// Re-export main types
pub use gate::{AllowReason, GateDecision, TwoFactorGate};
pub use server::{TwoFactorGateServer, TwoFactorGateServerBuilder};
pub use state::AppState;

use axum::{middleware::from_fn_with_state, Router};
use std::fmt;
use tower_http::trace::TraceLayer;
use twofa_core::process_env;

pub const ENV_GATE_HOST: &str = "TWOFA_GATE_HOST";
pub const ENV_GATE_PORT: &str = "TWOFA_GATE_PORT";
pub const ENV_UPSTREAM_URL: &str = "TWOFA_UPSTREAM_URL";
pub const ENV_SECRET_KEY: &str = "SECRET_KEY";

/// Create the gate application: status route, then everything else is
/// forwarded upstream once the gate lets it through
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::gate_routes())
        .fallback(proxy::forward_request)
        .layer(from_fn_with_state(
            state.gate.clone(),
            middleware::two_factor_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Configuration for the gate server
#[derive(Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Base URL of the host application
    pub upstream_url: String,
    /// Secret the host application signs its access tokens with
    pub secret_key: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upstream_url: "http://127.0.0.1:5000".to_string(),
            secret_key: "mysecretkey".to_string(),
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> WebResult<Self> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> WebResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup(ENV_GATE_PORT) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                WebError::Config(format!("{} must be a port number, got '{}'", ENV_GATE_PORT, raw))
            })?,
            None => defaults.port,
        };

        Ok(Self {
            host: lookup(ENV_GATE_HOST).unwrap_or(defaults.host),
            port,
            upstream_url: lookup(ENV_UPSTREAM_URL).unwrap_or(defaults.upstream_url),
            secret_key: lookup(ENV_SECRET_KEY).unwrap_or(defaults.secret_key),
        })
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for WebConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("upstream_url", &self.upstream_url)
            .field("secret_key", &"***")
            .finish()
    }
}

/// Error types for the gate server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Core(#[from] twofa_core::TwofaError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WebConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.upstream_url, "http://127.0.0.1:5000");
        assert_eq!(config.secret_key, "mysecretkey");
    }

    #[test]
    fn test_overrides() {
        let config = WebConfig::from_lookup(lookup_from(&[
            (ENV_GATE_HOST, "0.0.0.0"),
            (ENV_GATE_PORT, " 9000 "),
            (ENV_UPSTREAM_URL, "http://zou:5000"),
            (ENV_SECRET_KEY, "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.address(), "0.0.0.0:9000");
        assert_eq!(config.upstream_url, "http://zou:5000");
        assert!(!format!("{:?}", config).contains("s3cret"));
    }

    #[test]
    fn test_bad_port() {
        let err = WebConfig::from_lookup(lookup_from(&[(ENV_GATE_PORT, "http")])).unwrap_err();
        assert!(matches!(err, WebError::Config(_)));
    }
}
