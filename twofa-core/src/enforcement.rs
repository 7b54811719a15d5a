//! Audit, bulk enforcement and manual re-activation

use crate::account::Account;
use crate::audit::AuditReport;
use crate::config::EnforcementConfig;
use crate::error::TwofaResult;
use crate::not_found_error;
use crate::operator::Operator;
use crate::store::{AccountFilter, AccountStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Returned by `audit` and `enforce` when the store could not be used
pub const STORAGE_FAILURE: i64 = -1;

const RULE_WIDTH: usize = 80;

/// Runs the operator-facing 2FA operations against an account store
#[derive(Clone)]
pub struct Enforcer {
    store: Arc<dyn AccountStore>,
    config: Arc<EnforcementConfig>,
}

impl Enforcer {
    pub fn new(store: Arc<dyn AccountStore>, config: Arc<EnforcementConfig>) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EnforcementConfig {
        &self.config
    }

    /// Fetch and classify every account
    pub async fn audit_report(&self) -> TwofaResult<AuditReport> {
        let accounts = self.store.list_accounts(AccountFilter::all()).await?;
        Ok(AuditReport::build(accounts, &self.config.exempt))
    }

    /// Print the audit report.
    ///
    /// Returns the number of active, non-exempt accounts without 2FA, or
    /// [`STORAGE_FAILURE`].
    pub async fn audit(&self, operator: &mut dyn Operator) -> i64 {
        match self.audit_report().await {
            Ok(report) => {
                for line in report.lines() {
                    operator.say(&line);
                }
                let pending = report.non_compliant_count();
                info!(
                    total = report.entries.len(),
                    non_compliant = pending,
                    "Audit finished"
                );
                pending as i64
            }
            Err(e) => {
                e.log();
                operator.warn(&format!("Database error: {}", e));
                STORAGE_FAILURE
            }
        }
    }

    /// Disable active accounts without 2FA, after confirmation.
    ///
    /// Returns how many accounts were disabled (0 when nothing was needed or
    /// the operator declined), or [`STORAGE_FAILURE`].
    pub async fn enforce(&self, operator: &mut dyn Operator) -> i64 {
        match self.run_enforcement(operator).await {
            Ok(disabled) => disabled as i64,
            Err(e) => {
                e.log();
                operator.warn(&format!("Database error: {}", e));
                STORAGE_FAILURE
            }
        }
    }

    async fn run_enforcement(&self, operator: &mut dyn Operator) -> TwofaResult<usize> {
        let candidates = self
            .store
            .list_accounts(AccountFilter::active_without_2fa())
            .await?;

        if candidates.is_empty() {
            operator.say("All active users have 2FA enabled. No action needed.");
            return Ok(0);
        }

        let targets: Vec<Account> = candidates
            .into_iter()
            .filter(|account| !self.config.exempt.contains(&account.email))
            .collect();

        if targets.is_empty() {
            operator.say("All users without 2FA are in the exempt list. No action needed.");
            return Ok(0);
        }

        let rule = "=".repeat(RULE_WIDTH);
        operator.say(&rule);
        operator.say("2FA ENFORCEMENT");
        operator.say(&rule);
        operator.say(&format!(
            "Found {} active user(s) without 2FA that will be disabled:",
            targets.len()
        ));
        operator.say("");
        for account in &targets {
            operator.say(&format!(
                "  • {} (Name: {}, Role: {})",
                account.email,
                account.display_name(),
                account.role
            ));
        }
        operator.say("");
        operator.say("These users will be disabled until they configure 2FA.");
        operator.say("An administrator will need to re-enable them after they set up 2FA.");
        operator.say("");

        if !operator.confirm("Do you want to proceed? (yes/no): ") {
            operator.say("Operation cancelled.");
            info!(pending = targets.len(), "Enforcement cancelled by operator");
            return Ok(0);
        }

        let ids: Vec<_> = targets.iter().map(|a| a.id).collect();
        let outcomes = self.store.set_active_many(&ids, false).await?;

        let mut disabled = 0;
        for (account, outcome) in targets.iter().zip(outcomes.iter()) {
            match &outcome.result {
                Ok(()) => {
                    disabled += 1;
                    operator.say(&format!("  ✓ Disabled: {}", account.email));
                }
                Err(e) => {
                    warn!(account = %account.email, error = %e, "Failed to disable account");
                    operator.warn(&format!("  ✗ Failed to disable {}: {}", account.email, e));
                }
            }
        }

        operator.say("");
        operator.say(&format!("Successfully disabled {} user(s).", disabled));
        operator.say("");
        operator.say(&rule);

        info!(disabled, failed = targets.len() - disabled, "Enforcement finished");
        Ok(disabled)
    }

    /// Re-activate one account by email.
    ///
    /// Already active accounts are left alone. Accounts without 2FA need an
    /// extra confirmation since enforcement may disable them again.
    pub async fn enable_user(&self, email: &str, operator: &mut dyn Operator) -> bool {
        match self.run_enable(email, operator).await {
            Ok(enabled) => enabled,
            Err(e) => {
                e.log();
                operator.warn(&format!("Database error: {}", e));
                false
            }
        }
    }

    async fn run_enable(&self, email: &str, operator: &mut dyn Operator) -> TwofaResult<bool> {
        let Some(account) = self.store.find_by_email(email).await? else {
            let missing = not_found_error!(email, "enable_user");
            missing.log();
            operator.warn(&format!("User not found: {}", email));
            return Ok(false);
        };

        let has_2fa = account.has_2fa();
        operator.say(&format!("User: {}", account.email));
        operator.say(&format!("Name: {}", account.display_name()));
        operator.say(&format!(
            "2FA Status: {}",
            if has_2fa { "Enabled" } else { "Not configured" }
        ));
        operator.say(&format!(
            "Active: {}",
            if account.active { "Yes" } else { "No" }
        ));
        operator.say("");

        if account.active {
            operator.say("User is already active.");
            return Ok(true);
        }

        if !has_2fa {
            operator.say("WARNING: This user does not have 2FA configured!");
            operator.say("If REQUIRE_2FA enforcement is active, they may be disabled again.");
            if !operator.confirm("Do you still want to enable this user? (yes/no): ") {
                operator.say("Operation cancelled.");
                return Ok(false);
            }
        }

        self.store.set_active(account.id, true).await?;
        info!(account = %account.email, "Account re-enabled");
        operator.say(&format!("✓ User {} has been enabled.", account.email));
        Ok(true)
    }
}
