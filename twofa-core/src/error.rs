//! Unified error handling system
//!
//! Structured error types with context and recovery suggestions. The variants
//! follow the storage / identity split the CLI and the request gate rely on:
//! connection and fetch failures are fatal to an operation, single write
//! failures are isolated, identity failures never leave the gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub type TwofaResult<T> = Result<T, TwofaError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the 2FA tooling
#[derive(Error, Debug)]
pub enum TwofaError {
    /// The account store cannot be reached at all
    #[error("Cannot connect to account store: {message}")]
    StorageConnect {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// A read or transaction-level failure against a reachable store
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// A single account mutation failed
    #[error("Failed to update account {account}: {message}")]
    StorageWrite {
        account: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Account not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    /// The gate could not work out who is calling
    #[error("Identity resolution failed: {message}")]
    IdentityResolution {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TwofaError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            TwofaError::StorageConnect { context, .. } => Some(context),
            TwofaError::Storage { context, .. } => Some(context),
            TwofaError::StorageWrite { context, .. } => Some(context),
            TwofaError::NotFound { context, .. } => Some(context),
            TwofaError::IdentityResolution { context, .. } => Some(context),
            TwofaError::Config { context, .. } => Some(context),
            TwofaError::Io(_) => None,
        }
    }

    /// Whether the error must abort the whole operation.
    ///
    /// Write failures and missing accounts are reported per row / per lookup;
    /// identity failures are swallowed by the gate.
    pub fn is_fatal(&self) -> bool {
        match self {
            TwofaError::StorageConnect { .. }
            | TwofaError::Storage { .. }
            | TwofaError::Config { .. }
            | TwofaError::Io(_) => true,
            TwofaError::StorageWrite { .. }
            | TwofaError::NotFound { .. }
            | TwofaError::IdentityResolution { .. } => false,
        }
    }

    /// Recovery suggestions attached to the error, if any
    pub fn suggestions(&self) -> &[String] {
        self.context()
            .map(|c| c.recovery_suggestions.as_slice())
            .unwrap_or(&[])
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self {
            TwofaError::StorageConnect { .. } | TwofaError::Config { .. } => {
                error!(error_id = ?error_id, error = %self, "Fatal error");
            }
            TwofaError::StorageWrite { .. } => {
                warn!(error_id = ?error_id, error = %self, "Account update failed");
            }
            TwofaError::IdentityResolution { .. } => {
                warn!(error_id = ?error_id, error = %self, "Caller could not be resolved");
            }
            TwofaError::NotFound { .. } => {
                debug!(error_id = ?error_id, error = %self, "Lookup found nothing");
            }
            _ => {
                error!(error_id = ?error_id, error = %self, "Error occurred");
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::TwofaError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::TwofaError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! write_error {
    ($account:expr, $msg:expr, $component:expr) => {
        $crate::TwofaError::StorageWrite {
            account: $account.to_string(),
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::TwofaError::Config {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the environment variables or your .env file"),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::TwofaError::NotFound {
            resource: $resource.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the email address for typos")
                .with_suggestion("Run 'twofa audit' to list known accounts"),
        }
    };
}
