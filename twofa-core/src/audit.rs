//! 2FA audit report

use crate::account::Account;
use crate::compliance::{classify, ComplianceVerdict, ExemptSet};
use chrono::{DateTime, Local};

const RULE_WIDTH: usize = 80;

/// One classified account in the report
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub account: Account,
    pub verdict: ComplianceVerdict,
    pub exempt: bool,
}

impl AuditEntry {
    fn marker(&self) -> &'static str {
        if self.exempt {
            " [EXEMPT]"
        } else {
            ""
        }
    }

    fn name_line(&self) -> String {
        format!(
            "    Name: {}, Role: {}",
            self.account.display_name(),
            self.account.role
        )
    }
}

/// Snapshot of every account's 2FA state.
///
/// Inactive accounts get their own bucket whatever their 2FA state; active
/// accounts are split by whether any method is enabled.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub generated_at: DateTime<Local>,
    pub entries: Vec<AuditEntry>,
    pub configured_exempt: Vec<String>,
}

impl AuditReport {
    pub fn build(accounts: Vec<Account>, exempt: &ExemptSet) -> Self {
        let entries = accounts
            .into_iter()
            .map(|account| AuditEntry {
                verdict: classify(&account, exempt),
                exempt: exempt.contains(&account.email),
                account,
            })
            .collect();

        Self {
            generated_at: Local::now(),
            entries,
            configured_exempt: exempt.iter().map(str::to_string).collect(),
        }
    }

    pub fn with_2fa(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.account.active && e.account.has_2fa())
    }

    pub fn without_2fa(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.account.active && !e.account.has_2fa())
    }

    pub fn inactive(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| !e.account.active)
    }

    pub fn exempt_count(&self) -> usize {
        self.entries.iter().filter(|e| e.exempt).count()
    }

    /// Active accounts that enforcement would disable
    pub fn non_compliant_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.verdict.requires_action())
            .count()
    }

    /// Render the report as console lines
    pub fn lines(&self) -> Vec<String> {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);
        let mut out = vec![
            heavy.clone(),
            "2FA AUDIT REPORT".to_string(),
            heavy.clone(),
            format!(
                "Generated: {}",
                self.generated_at.format("%Y-%m-%d %H:%M:%S")
            ),
            String::new(),
            "SUMMARY:".to_string(),
            format!("  Total users: {}", self.entries.len()),
            format!("  Users with 2FA: {}", self.with_2fa().count()),
            format!("  Users without 2FA: {}", self.without_2fa().count()),
            format!("  Inactive users: {}", self.inactive().count()),
            format!("  Exempt users: {}", self.exempt_count()),
            String::new(),
        ];

        let with_2fa: Vec<_> = self.with_2fa().collect();
        if !with_2fa.is_empty() {
            out.push("USERS WITH 2FA ENABLED:".to_string());
            out.push(light.clone());
            for entry in with_2fa {
                let methods: Vec<_> = entry.account.methods().iter().map(|m| m.label()).collect();
                out.push(format!(
                    "  ✓ {:<40} {}{}",
                    entry.account.email,
                    methods.join(", "),
                    entry.marker()
                ));
                out.push(entry.name_line());
            }
            out.push(String::new());
        }

        let without_2fa: Vec<_> = self.without_2fa().collect();
        if !without_2fa.is_empty() {
            out.push("USERS WITHOUT 2FA:".to_string());
            out.push(light.clone());
            for entry in without_2fa {
                out.push(format!(
                    "  ✗ {:<40} Active{}",
                    entry.account.email,
                    entry.marker()
                ));
                out.push(entry.name_line());
            }
            out.push(String::new());
        }

        let inactive: Vec<_> = self.inactive().collect();
        if !inactive.is_empty() {
            out.push("INACTIVE USERS:".to_string());
            out.push(light.clone());
            for entry in inactive {
                let status = if entry.account.has_2fa() {
                    "with 2FA"
                } else {
                    "without 2FA"
                };
                out.push(format!(
                    "  - {:<40} {}{}",
                    entry.account.email,
                    status,
                    entry.marker()
                ));
                out.push(entry.name_line());
            }
            out.push(String::new());
        }

        if !self.configured_exempt.is_empty() {
            out.push("CONFIGURED EXEMPT USERS:".to_string());
            out.push(light);
            for email in &self.configured_exempt {
                out.push(format!("  • {}", email));
            }
            out.push(String::new());
        }

        out.push(heavy);
        out
    }
}
