//! Compliance evaluation: account + exempt set -> verdict

use crate::account::Account;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Emails excluded from 2FA enforcement.
///
/// Entries are trimmed and lower-cased on the way in; lookups are
/// case-insensitive. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptSet {
    emails: BTreeSet<String>,
}

impl ExemptSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list, ignoring blank entries
    pub fn parse(list: &str) -> Self {
        list.split(',').collect()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExemptSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let emails = iter
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }
}

/// Outcome of classifying one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceVerdict {
    Compliant,
    NonCompliant,
    Exempt,
    Inactive,
}

impl ComplianceVerdict {
    /// Only non-compliant accounts are subject to enforcement
    pub fn requires_action(&self) -> bool {
        matches!(self, ComplianceVerdict::NonCompliant)
    }
}

impl fmt::Display for ComplianceVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComplianceVerdict::Compliant => "compliant",
            ComplianceVerdict::NonCompliant => "non-compliant",
            ComplianceVerdict::Exempt => "exempt",
            ComplianceVerdict::Inactive => "inactive",
        };
        f.write_str(label)
    }
}

/// Classify an account.
///
/// Any enabled method makes the account compliant. Without one, exemption
/// wins over everything else, then an inactive account is `Inactive` and an
/// active one `NonCompliant`.
pub fn classify(account: &Account, exempt: &ExemptSet) -> ComplianceVerdict {
    if account.has_2fa() {
        ComplianceVerdict::Compliant
    } else if exempt.contains(&account.email) {
        ComplianceVerdict::Exempt
    } else if !account.active {
        ComplianceVerdict::Inactive
    } else {
        ComplianceVerdict::NonCompliant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::TwoFactorMethod;

    #[test]
    fn test_exempt_set_parse() {
        let set = ExemptSet::parse(" Admin@X.com, ,ops@x.com,");
        assert_eq!(set.len(), 2);
        assert!(set.contains("admin@x.com"));
        assert!(set.contains("ADMIN@x.COM"));
        assert!(set.contains("ops@x.com"));
        assert!(!set.contains("other@x.com"));

        assert!(ExemptSet::parse("").is_empty());
    }

    #[test]
    fn test_no_2fa_not_exempt() {
        let exempt = ExemptSet::new();
        let active = Account::new("a@x.com");
        assert_eq!(classify(&active, &exempt), ComplianceVerdict::NonCompliant);

        let inactive = Account::new("a@x.com").inactive();
        assert_eq!(classify(&inactive, &exempt), ComplianceVerdict::Inactive);
    }

    #[test]
    fn test_any_method_is_compliant_regardless_of_exemption() {
        let exempt = ExemptSet::parse("a@x.com");
        for method in [
            TwoFactorMethod::Totp,
            TwoFactorMethod::EmailOtp,
            TwoFactorMethod::Fido,
        ] {
            let account = Account::new("a@x.com").with_method(method);
            assert_eq!(classify(&account, &exempt), ComplianceVerdict::Compliant);
            assert_eq!(
                classify(&account, &ExemptSet::new()),
                ComplianceVerdict::Compliant
            );
            assert_eq!(
                classify(&account.clone().inactive(), &exempt),
                ComplianceVerdict::Compliant
            );
        }
    }

    #[test]
    fn test_exempt_never_non_compliant() {
        let exempt = ExemptSet::parse("A@X.com");
        let active = Account::new("a@x.com");
        let inactive = Account::new("a@x.com").inactive();

        assert_eq!(classify(&active, &exempt), ComplianceVerdict::Exempt);
        assert_eq!(classify(&inactive, &exempt), ComplianceVerdict::Exempt);
        assert!(!classify(&active, &exempt).requires_action());
    }

    #[test]
    fn test_scenario_single_account() {
        let account = Account::new("a@x.com");
        assert_eq!(
            classify(&account, &ExemptSet::new()),
            ComplianceVerdict::NonCompliant
        );
        assert_eq!(
            classify(&account, &ExemptSet::parse("a@x.com")),
            ComplianceVerdict::Exempt
        );
    }
}
