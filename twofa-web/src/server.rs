//! Gate server
//!
//! Binds the listener and serves the gated proxy.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use twofa_core::{AccountStore, EnforcementConfig};

const RULE: &str =
    "================================================================================";

/// Startup lines describing what the gate will enforce
pub fn enforcement_banner(config: &EnforcementConfig) -> Vec<String> {
    let mut lines = vec![RULE.to_string()];
    if config.require_2fa {
        let exempt = if config.exempt.is_empty() {
            "None".to_string()
        } else {
            config.exempt.iter().collect::<Vec<_>>().join(", ")
        };
        lines.push("2FA ENFORCEMENT ENABLED".to_string());
        lines.push(format!("Exempt users: {}", exempt));
        lines.push("Users without 2FA will be redirected to configure it.".to_string());
    } else {
        lines.push("2FA enforcement is disabled".to_string());
        lines.push("To enable, set REQUIRE_2FA=True in your .env file".to_string());
    }
    lines.push(RULE.to_string());
    lines
}

pub struct TwoFactorGateServer {
    config: WebConfig,
    state: AppState,
}

impl TwoFactorGateServer {
    pub fn new(
        config: WebConfig,
        enforcement: Arc<EnforcementConfig>,
        store: Arc<dyn AccountStore>,
    ) -> WebResult<Self> {
        let state = AppState::new(config.clone(), enforcement, store)?;
        Ok(Self { config, state })
    }

    /// Everything logged before the listener binds
    pub fn startup_lines(&self) -> Vec<String> {
        let mut lines = vec![
            "🚀 Starting 2FA gate".to_string(),
            format!("📍 Gate address: http://{}", self.config.address()),
            format!("🔀 Upstream: {}", self.config.upstream_url),
        ];
        lines.extend(enforcement_banner(self.state.gate.config()));
        lines
    }

    /// Start the gate server
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        for line in self.startup_lines() {
            info!("{}", line);
        }

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("✅ Gate listening on http://{}", address);

        // Peer addresses feed x-forwarded-for
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = serve(listener, service).await {
            error!("❌ Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for TwoFactorGateServer
pub struct TwoFactorGateServerBuilder {
    config: WebConfig,
    enforcement: Arc<EnforcementConfig>,
    store: Option<Arc<dyn AccountStore>>,
}

impl Default for TwoFactorGateServerBuilder {
    fn default() -> Self {
        Self::new(WebConfig::default())
    }
}

impl TwoFactorGateServerBuilder {
    pub fn new(config: WebConfig) -> Self {
        Self {
            config,
            enforcement: Arc::new(EnforcementConfig::default()),
            store: None,
        }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the host application's base URL
    pub fn upstream_url<S: Into<String>>(mut self, upstream_url: S) -> Self {
        self.config.upstream_url = upstream_url.into();
        self
    }

    pub fn enforcement(mut self, enforcement: Arc<EnforcementConfig>) -> Self {
        self.enforcement = enforcement;
        self
    }

    /// Account store used to look up callers
    pub fn store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the server
    pub fn build(self) -> WebResult<TwoFactorGateServer> {
        let store = self
            .store
            .ok_or_else(|| WebError::Config("no account store configured".to_string()))?;
        TwoFactorGateServer::new(self.config, self.enforcement, store)
    }
}
