//! Account model mirroring the host application's person table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque account identifier (a UUID in the host schema)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Second factor methods supported by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorMethod {
    Totp,
    EmailOtp,
    Fido,
}

impl TwoFactorMethod {
    pub fn label(&self) -> &'static str {
        match self {
            TwoFactorMethod::Totp => "TOTP",
            TwoFactorMethod::EmailOtp => "Email OTP",
            TwoFactorMethod::Fido => "FIDO",
        }
    }
}

impl fmt::Display for TwoFactorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user account as read from the store.
///
/// Rows without an email never become an `Account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
    pub role: String,
    pub totp_enabled: bool,
    pub email_otp_enabled: bool,
    pub fido_enabled: bool,
}

impl Account {
    /// Active account with no second factor and the default role
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(),
            email: email.into(),
            first_name: None,
            last_name: None,
            active: true,
            role: "user".to_string(),
            totp_enabled: false,
            email_otp_enabled: false,
            fido_enabled: false,
        }
    }

    pub fn named(mut self, first: &str, last: &str) -> Self {
        self.first_name = Some(first.to_string());
        self.last_name = Some(last.to_string());
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn with_method(mut self, method: TwoFactorMethod) -> Self {
        match method {
            TwoFactorMethod::Totp => self.totp_enabled = true,
            TwoFactorMethod::EmailOtp => self.email_otp_enabled = true,
            TwoFactorMethod::Fido => self.fido_enabled = true,
        }
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// True when any second factor is enabled
    pub fn has_2fa(&self) -> bool {
        self.totp_enabled || self.email_otp_enabled || self.fido_enabled
    }

    /// Enabled methods, always in TOTP, Email OTP, FIDO order
    pub fn methods(&self) -> Vec<TwoFactorMethod> {
        [
            (self.totp_enabled, TwoFactorMethod::Totp),
            (self.email_otp_enabled, TwoFactorMethod::EmailOtp),
            (self.fido_enabled, TwoFactorMethod::Fido),
        ]
        .into_iter()
        .filter_map(|(enabled, method)| enabled.then_some(method))
        .collect()
    }

    /// "First Last", with missing parts left out
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}
