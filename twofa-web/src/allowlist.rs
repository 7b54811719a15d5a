//! Paths that pass the gate without looking at the caller
//!
//! The table is data, not branching: every entry is a plain prefix matched
//! against the request path with its leading slashes removed.

/// Authentication and 2FA self-service endpoints. Each is reachable both
/// with and without the `api/` prefix, depending on the front proxy.
const AUTH_PREFIXES: &[&str] = &[
    // login flow
    "auth/login",
    "auth/logout",
    "auth/authenticated",
    "auth/register",
    // 2FA configuration
    "auth/totp",
    "auth/fido",
    "auth/email-otp",
    "auth/recovery-codes",
    // legacy 2FA actions
    "actions/persons/enable-totp",
    "actions/persons/disable-totp",
    "actions/persons/enable-email-otp",
    "actions/persons/disable-email-otp",
    "actions/persons/register-fido-device",
    "actions/persons/unregister-fido-device",
    "actions/persons/generate-recovery-codes",
];

/// Static assets, app config and health checks
const SHARED_PREFIXES: &[&str] = &["static/", "config", "_health", "health"];

/// Read-only data API, open to GET requests from anyone
const READ_ONLY_NAMESPACES: &[&str] = &["data/", "api/data/"];

/// Strip leading slashes
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// True when a normalized path lives under the read-only data API
pub fn is_read_only_namespace(normalized: &str) -> bool {
    READ_ONLY_NAMESPACES
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
}

#[derive(Debug, Clone)]
pub struct PathAllowList {
    prefixes: Vec<String>,
}

impl Default for PathAllowList {
    fn default() -> Self {
        Self::standard()
    }
}

impl PathAllowList {
    /// The host application's auth, 2FA setup, static and health endpoints
    pub fn standard() -> Self {
        let prefixes = AUTH_PREFIXES
            .iter()
            .flat_map(|p| [format!("api/{}", p), p.to_string()])
            .chain(SHARED_PREFIXES.iter().map(|p| p.to_string()))
            .collect();
        Self { prefixes }
    }

    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a normalized path starts with any listed prefix
    pub fn permits(&self, normalized: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| normalized.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}
