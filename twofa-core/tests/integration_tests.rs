//! Integration tests for audit, enforcement and re-activation against the
//! in-memory account store

use std::sync::Arc;
use twofa_core::{
    Account, AccountFilter, AccountStore, EnforcementConfig, Enforcer, ExemptSet,
    MemoryAccountStore, ScriptedOperator, TwoFactorMethod, STORAGE_FAILURE,
};

fn enforcer(store: &MemoryAccountStore, exempt: &str) -> Enforcer {
    let config = EnforcementConfig::new(true, ExemptSet::parse(exempt));
    Enforcer::new(Arc::new(store.clone()), Arc::new(config))
}

async fn active_emails(store: &MemoryAccountStore) -> Vec<String> {
    store
        .list_accounts(AccountFilter {
            active: Some(true),
            has_2fa: None,
        })
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.email)
        .collect()
}

#[tokio::test]
async fn test_enforce_single_non_compliant_account() {
    let account = Account::new("a@x.com");
    let id = account.id;
    let store = MemoryAccountStore::with_accounts([account]).await;
    let mut operator = ScriptedOperator::answering(["yes"]);

    let disabled = enforcer(&store, "").enforce(&mut operator).await;

    assert_eq!(disabled, 1);
    assert!(!store.snapshot(id).await.unwrap().active);
    let output = operator.output();
    assert!(output.contains("Found 1 active user(s) without 2FA that will be disabled:"));
    assert!(output.contains("  • a@x.com"));
    assert!(output.contains("  ✓ Disabled: a@x.com"));
    assert!(output.contains("Successfully disabled 1 user(s)."));
    assert_eq!(operator.prompts, vec!["Do you want to proceed? (yes/no): "]);
}

#[tokio::test]
async fn test_enforce_exempt_account_needs_no_action() {
    let account = Account::new("a@x.com");
    let id = account.id;
    let store = MemoryAccountStore::with_accounts([account]).await;
    let mut operator = ScriptedOperator::answering(["yes"]);

    let disabled = enforcer(&store, "A@X.com").enforce(&mut operator).await;

    assert_eq!(disabled, 0);
    assert!(store.snapshot(id).await.unwrap().active);
    assert!(operator
        .output()
        .contains("All users without 2FA are in the exempt list. No action needed."));
    assert!(operator.prompts.is_empty());
}

#[tokio::test]
async fn test_enforce_declined_changes_nothing() {
    let store = MemoryAccountStore::with_accounts([
        Account::new("a@x.com"),
        Account::new("b@x.com"),
        Account::new("c@x.com").with_method(TwoFactorMethod::Totp),
    ])
    .await;

    for answer in ["no", "y", ""] {
        let mut operator = ScriptedOperator::answering([answer]);
        let disabled = enforcer(&store, "").enforce(&mut operator).await;

        assert_eq!(disabled, 0);
        assert!(operator.output().contains("Operation cancelled."));
        assert_eq!(active_emails(&store).await.len(), 3);
    }
}

#[tokio::test]
async fn test_enforce_is_idempotent() {
    let store = MemoryAccountStore::with_accounts([
        Account::new("a@x.com"),
        Account::new("b@x.com"),
        Account::new("c@x.com").with_method(TwoFactorMethod::Fido),
    ])
    .await;
    let enforcer = enforcer(&store, "");

    let mut first = ScriptedOperator::answering(["yes"]);
    assert_eq!(enforcer.enforce(&mut first).await, 2);

    let mut second = ScriptedOperator::answering(["yes"]);
    assert_eq!(enforcer.enforce(&mut second).await, 0);
    assert!(second
        .output()
        .contains("All active users have 2FA enabled. No action needed."));
    assert!(second.prompts.is_empty());
    assert_eq!(active_emails(&store).await, vec!["c@x.com"]);
}

#[tokio::test]
async fn test_enforce_continues_after_row_failure() {
    let a = Account::new("a@x.com");
    let b = Account::new("b@x.com");
    let (a_id, b_id) = (a.id, b.id);
    let store = MemoryAccountStore::with_accounts([a, b]).await;
    store.fail_writes_for(a_id).await;
    let mut operator = ScriptedOperator::answering(["yes"]);

    let disabled = enforcer(&store, "").enforce(&mut operator).await;

    assert_eq!(disabled, 1);
    assert!(store.snapshot(a_id).await.unwrap().active);
    assert!(!store.snapshot(b_id).await.unwrap().active);
    assert!(operator.errors().contains("  ✗ Failed to disable a@x.com"));
    assert!(operator.output().contains("Successfully disabled 1 user(s)."));
}

#[tokio::test]
async fn test_enforce_rolls_back_interrupted_batch() {
    let a = Account::new("a@x.com");
    let b = Account::new("b@x.com");
    let b_id = b.id;
    let store = MemoryAccountStore::with_accounts([a, b]).await;
    store.interrupt_batch_at(b_id).await;
    let mut operator = ScriptedOperator::answering(["yes"]);

    let result = enforcer(&store, "").enforce(&mut operator).await;

    assert_eq!(result, STORAGE_FAILURE);
    assert_eq!(active_emails(&store).await.len(), 2);
    assert!(operator.errors().starts_with("Database error:"));
}

#[tokio::test]
async fn test_storage_offline() {
    let store = MemoryAccountStore::with_accounts([Account::new("a@x.com")]).await;
    store.set_offline(true).await;
    let enforcer = enforcer(&store, "");

    let mut operator = ScriptedOperator::new();
    assert_eq!(enforcer.audit(&mut operator).await, STORAGE_FAILURE);
    assert_eq!(enforcer.enforce(&mut operator).await, STORAGE_FAILURE);
    assert!(!enforcer.enable_user("a@x.com", &mut operator).await);
    assert_eq!(operator.stderr.len(), 3);
}

#[tokio::test]
async fn test_audit_counts_non_compliant_active_accounts() {
    let store = MemoryAccountStore::with_accounts([
        Account::new("a@x.com"),
        Account::new("bot@x.com"),
        Account::new("c@x.com").with_method(TwoFactorMethod::EmailOtp),
        Account::new("d@x.com").inactive(),
    ])
    .await;
    store.insert_without_email(Account::new("")).await;
    let mut operator = ScriptedOperator::new();

    let pending = enforcer(&store, "bot@x.com").audit(&mut operator).await;

    assert_eq!(pending, 1);
    let output = operator.output();
    assert!(output.contains("  Total users: 4"));
    assert!(output.contains("  Exempt users: 1"));
    assert!(output.contains("  • bot@x.com"));
    assert!(operator.stderr.is_empty());
}

#[tokio::test]
async fn test_enable_user_not_found() {
    let store = MemoryAccountStore::new();
    let mut operator = ScriptedOperator::new();

    assert!(!enforcer(&store, "").enable_user("ghost@x.com", &mut operator).await);
    assert_eq!(operator.errors(), "User not found: ghost@x.com");
}

#[tokio::test]
async fn test_enable_user_already_active() {
    let store = MemoryAccountStore::with_accounts([Account::new("a@x.com")]).await;
    let mut operator = ScriptedOperator::new();

    assert!(enforcer(&store, "").enable_user("a@x.com", &mut operator).await);
    assert!(operator.output().contains("User is already active."));
    assert!(operator.prompts.is_empty());
}

#[tokio::test]
async fn test_enable_user_without_2fa_requires_confirmation() {
    let account = Account::new("a@x.com").inactive();
    let id = account.id;
    let store = MemoryAccountStore::with_accounts([account]).await;
    let enforcer = enforcer(&store, "");

    let mut declined = ScriptedOperator::answering(["no"]);
    assert!(!enforcer.enable_user("a@x.com", &mut declined).await);
    assert!(declined
        .output()
        .contains("WARNING: This user does not have 2FA configured!"));
    assert!(!store.snapshot(id).await.unwrap().active);

    let mut confirmed = ScriptedOperator::answering(["yes"]);
    assert!(enforcer.enable_user("a@x.com", &mut confirmed).await);
    assert!(confirmed
        .output()
        .contains("✓ User a@x.com has been enabled."));
    assert!(store.snapshot(id).await.unwrap().active);
}

#[tokio::test]
async fn test_enable_user_with_2fa_needs_no_confirmation() {
    let account = Account::new("a@x.com")
        .named("Ada", "Lovelace")
        .with_method(TwoFactorMethod::Totp)
        .inactive();
    let id = account.id;
    let store = MemoryAccountStore::with_accounts([account]).await;
    let mut operator = ScriptedOperator::new();

    assert!(enforcer(&store, "").enable_user("a@x.com", &mut operator).await);
    assert!(operator.prompts.is_empty());
    assert!(operator.output().contains("Name: Ada Lovelace"));
    assert!(operator.output().contains("2FA Status: Enabled"));
    assert!(store.snapshot(id).await.unwrap().active);
}
