//! Environment-derived configuration
//!
//! Every loader takes a variable lookup so it can be driven from a map in
//! tests; `from_env` plugs in the process environment.

use crate::compliance::ExemptSet;
use crate::config_error;
use crate::error::TwofaResult;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ENV_REQUIRE_2FA: &str = "REQUIRE_2FA";
pub const ENV_EXEMPT_USERS: &str = "2FA_EXEMPT_USERS";
pub const ENV_DB_HOST: &str = "DB_HOST";
pub const ENV_DB_PORT: &str = "DB_PORT";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_DB_NAME: &str = "DB_DB";

/// Read a variable from the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// `true`, `1` and `yes` (any case) switch a flag on; anything else is off
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

/// Enforcement switch and exempt users, shared by the CLI and the gate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnforcementConfig {
    pub require_2fa: bool,
    pub exempt: ExemptSet,
}

impl EnforcementConfig {
    pub fn new(require_2fa: bool, exempt: ExemptSet) -> Self {
        Self {
            require_2fa,
            exempt,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            require_2fa: lookup(ENV_REQUIRE_2FA)
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            exempt: lookup(ENV_EXEMPT_USERS)
                .map(|v| ExemptSet::parse(&v))
                .unwrap_or_default(),
        }
    }
}

/// Connection parameters for the host application's database
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "zoudb".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> TwofaResult<Self> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> TwofaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup(ENV_DB_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                config_error!(
                    format!("{} must be a port number, got '{}'", ENV_DB_PORT, raw),
                    ENV_DB_PORT,
                    "config"
                )
            })?,
            None => defaults.port,
        };

        Ok(Self {
            host: lookup(ENV_DB_HOST).unwrap_or(defaults.host),
            port,
            user: lookup(ENV_DB_USER).unwrap_or(defaults.user),
            password: lookup(ENV_DB_PASSWORD).unwrap_or(defaults.password),
            database: lookup(ENV_DB_NAME).unwrap_or(defaults.database),
        })
    }

    /// `user@host:port/database`, safe for logs
    pub fn target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

// Keeps the password out of Debug output.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}
