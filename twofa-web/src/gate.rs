//! Per-request 2FA gate
//!
//! Write requests from signed-in users without a second factor are refused;
//! everything else passes. When the caller cannot be determined the request
//! passes too, and the host application's own authentication decides.

use crate::allowlist::{is_read_only_namespace, normalize_path, PathAllowList};
use crate::block::BlockResponse;
use crate::identity::IdentityResolver;
use axum::http::{HeaderMap, Method};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use twofa_core::EnforcementConfig;

/// Why a request was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    EnforcementOff,
    AllowListed,
    Preflight,
    ReadOnlyNamespace,
    Anonymous,
    ResolutionFailed,
    Exempt,
    HasTwoFactor,
    ReadMethod,
}

impl fmt::Display for AllowReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            AllowReason::EnforcementOff => "enforcement off",
            AllowReason::AllowListed => "allow-listed path",
            AllowReason::Preflight => "preflight",
            AllowReason::ReadOnlyNamespace => "read-only data",
            AllowReason::Anonymous => "no caller",
            AllowReason::ResolutionFailed => "caller unresolved",
            AllowReason::Exempt => "exempt caller",
            AllowReason::HasTwoFactor => "caller has 2FA",
            AllowReason::ReadMethod => "read request",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow(AllowReason),
    Block(BlockResponse),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow(_))
    }
}

pub struct TwoFactorGate {
    config: Arc<EnforcementConfig>,
    allow_list: PathAllowList,
    identity: IdentityResolver,
}

impl TwoFactorGate {
    pub fn new(config: Arc<EnforcementConfig>, identity: IdentityResolver) -> Self {
        Self {
            config,
            allow_list: PathAllowList::standard(),
            identity,
        }
    }

    pub fn with_allow_list(mut self, allow_list: PathAllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    pub fn config(&self) -> &EnforcementConfig {
        &self.config
    }

    /// Decide whether a request may reach the application
    pub async fn evaluate(&self, method: &Method, path: &str, headers: &HeaderMap) -> GateDecision {
        if !self.config.require_2fa {
            return GateDecision::Allow(AllowReason::EnforcementOff);
        }

        let normalized = normalize_path(path);
        if self.allow_list.permits(normalized) {
            return GateDecision::Allow(AllowReason::AllowListed);
        }
        if method == Method::OPTIONS {
            return GateDecision::Allow(AllowReason::Preflight);
        }
        if method == Method::GET && is_read_only_namespace(normalized) {
            return GateDecision::Allow(AllowReason::ReadOnlyNamespace);
        }

        debug!("Checking 2FA for {} {}", method, path);

        let caller = match self.identity.resolve(headers).await {
            Ok(Some(caller)) => caller,
            Ok(None) => return GateDecision::Allow(AllowReason::Anonymous),
            Err(e) => {
                e.log();
                warn!("Letting {} {} through: {}", method, path, e);
                return GateDecision::Allow(AllowReason::ResolutionFailed);
            }
        };

        if self.config.exempt.contains(&caller.email) {
            debug!("{} is exempt from 2FA", caller.email);
            return GateDecision::Allow(AllowReason::Exempt);
        }
        if caller.has_2fa() {
            return GateDecision::Allow(AllowReason::HasTwoFactor);
        }
        if method == Method::GET {
            return GateDecision::Allow(AllowReason::ReadMethod);
        }

        info!(
            "Blocking {} {} from {}: 2FA required",
            method, path, caller.email
        );
        GateDecision::Block(BlockResponse::two_factor_required(
            &caller.email,
            path,
            headers,
        ))
    }
}
