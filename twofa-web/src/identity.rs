//! Caller identity for the gate
//!
//! A request carries a bearer token, the host application's session cookie,
//! or both. Both hold the same kind of signed access token. The bearer token
//! is tried first; a credential that identifies nobody never hides one that
//! does.

pub mod jwt;

pub use jwt::{Claims, TokenError, TokenType, TokenVerifier};

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;
use twofa_core::{Account, AccountStore, ErrorContext, TwofaError, TwofaResult};

/// Cookie the host application stores its access token in
pub const SESSION_COOKIE: &str = "access_token_cookie";

/// Which credential a request presents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Bearer(String),
    SessionCookie(String),
}

impl CredentialSource {
    /// Preferred credential: an `Authorization: Bearer` header before the
    /// session cookie
    pub fn detect(headers: &HeaderMap) -> Option<Self> {
        Self::presented(headers).into_iter().next()
    }

    /// Every credential on the request, in the order they are tried
    pub fn presented(headers: &HeaderMap) -> Vec<Self> {
        bearer_token(headers)
            .map(CredentialSource::Bearer)
            .into_iter()
            .chain(cookie_value(headers, SESSION_COOKIE).map(CredentialSource::SessionCookie))
            .collect()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Turns a credential into the calling account.
///
/// `Ok(None)` means the credential does not identify anyone; errors mean the
/// lookup itself failed.
#[async_trait]
pub trait CallerResolver: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    async fn resolve(&self, credential: &str) -> TwofaResult<Option<Account>>;
}

/// Token verification followed by a fresh account lookup
#[derive(Clone)]
struct TokenLookup {
    verifier: Arc<TokenVerifier>,
    store: Arc<dyn AccountStore>,
}

impl TokenLookup {
    async fn account_for(&self, token: &str, source: &str) -> TwofaResult<Option<Account>> {
        let claims = match self.verifier.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(source, error = %e, "Credential rejected");
                return Ok(None);
            }
        };

        let id = match claims.account_id() {
            Ok(id) => id,
            Err(e) => {
                debug!(source, error = %e, "Credential rejected");
                return Ok(None);
            }
        };

        self.store
            .find_by_id(id)
            .await
            .map_err(|e| TwofaError::IdentityResolution {
                message: format!("account lookup failed: {}", e),
                context: ErrorContext::new("identity")
                    .with_operation(source)
                    .with_metadata("account", &id.to_string()),
            })
    }
}

/// Resolves `Authorization: Bearer` tokens
pub struct BearerTokenResolver {
    lookup: TokenLookup,
}

impl BearerTokenResolver {
    pub fn new(verifier: Arc<TokenVerifier>, store: Arc<dyn AccountStore>) -> Self {
        Self {
            lookup: TokenLookup { verifier, store },
        }
    }
}

#[async_trait]
impl CallerResolver for BearerTokenResolver {
    fn name(&self) -> &'static str {
        "bearer"
    }

    async fn resolve(&self, credential: &str) -> TwofaResult<Option<Account>> {
        self.lookup.account_for(credential, self.name()).await
    }
}

/// Resolves the session cookie set by the host application's login
pub struct SessionCookieResolver {
    lookup: TokenLookup,
}

impl SessionCookieResolver {
    pub fn new(verifier: Arc<TokenVerifier>, store: Arc<dyn AccountStore>) -> Self {
        Self {
            lookup: TokenLookup { verifier, store },
        }
    }
}

#[async_trait]
impl CallerResolver for SessionCookieResolver {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn resolve(&self, credential: &str) -> TwofaResult<Option<Account>> {
        self.lookup.account_for(credential, self.name()).await
    }
}

/// Dispatches to the resolver matching the request's credential
#[derive(Clone)]
pub struct IdentityResolver {
    bearer: Arc<dyn CallerResolver>,
    session: Arc<dyn CallerResolver>,
}

impl IdentityResolver {
    pub fn new(bearer: Arc<dyn CallerResolver>, session: Arc<dyn CallerResolver>) -> Self {
        Self { bearer, session }
    }

    /// Bearer and session resolvers sharing one verifier and store
    pub fn from_store(verifier: Arc<TokenVerifier>, store: Arc<dyn AccountStore>) -> Self {
        Self::new(
            Arc::new(BearerTokenResolver::new(verifier.clone(), store.clone())),
            Arc::new(SessionCookieResolver::new(verifier, store)),
        )
    }

    /// Resolve the caller from the first credential that identifies an
    /// account. A panicking resolver is reported as an error.
    pub async fn resolve(&self, headers: &HeaderMap) -> TwofaResult<Option<Account>> {
        for source in CredentialSource::presented(headers) {
            let (resolver, credential) = match &source {
                CredentialSource::Bearer(token) => (&self.bearer, token),
                CredentialSource::SessionCookie(token) => (&self.session, token),
            };
            if let Some(account) = Self::run(resolver, credential).await? {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }

    async fn run(
        resolver: &Arc<dyn CallerResolver>,
        credential: &str,
    ) -> TwofaResult<Option<Account>> {
        match AssertUnwindSafe(resolver.resolve(credential))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TwofaError::IdentityResolution {
                message: format!("{} resolver panicked", resolver.name()),
                context: ErrorContext::new("identity").with_operation(resolver.name()),
            }),
        }
    }
}
