//! Shared application state

use crate::gate::TwoFactorGate;
use crate::identity::{IdentityResolver, TokenVerifier};
use crate::proxy::UpstreamProxy;
use crate::{WebConfig, WebResult};
use std::sync::Arc;
use twofa_core::{AccountStore, EnforcementConfig};

/// Everything a request handler needs; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WebConfig>,
    pub gate: Arc<TwoFactorGate>,
    pub proxy: Arc<UpstreamProxy>,
}

impl AppState {
    pub fn new(
        config: WebConfig,
        enforcement: Arc<EnforcementConfig>,
        store: Arc<dyn AccountStore>,
    ) -> WebResult<Self> {
        let verifier = Arc::new(TokenVerifier::new(config.secret_key.as_bytes()));
        let identity = IdentityResolver::from_store(verifier, store);
        let gate = TwoFactorGate::new(enforcement, identity);
        let proxy = UpstreamProxy::new(&config.upstream_url)?;

        Ok(Self {
            config: Arc::new(config),
            gate: Arc::new(gate),
            proxy: Arc::new(proxy),
        })
    }
}
