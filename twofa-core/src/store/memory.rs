//! In-process account store for tests and local runs
//!
//! Supports fault injection so the storage failure paths of the reporter can
//! be exercised without a database.

use super::{AccountFilter, AccountStore, RowOutcome};
use crate::account::{Account, AccountId};
use crate::error::{ErrorContext, TwofaError, TwofaResult};
use crate::{storage_error, write_error};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredPerson {
    account: Account,
    // Rows without an email exist in the host table but are never served.
    has_email: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<StoredPerson>,
    offline: bool,
    failing_writes: HashSet<AccountId>,
    interrupt_at: Option<AccountId>,
}

impl MemoryState {
    fn ensure_online(&self) -> TwofaResult<()> {
        if self.offline {
            return Err(TwofaError::StorageConnect {
                message: "memory store is offline".to_string(),
                source: None,
                context: ErrorContext::new("memory_store")
                    .with_suggestion("Check that the database is running"),
            });
        }
        Ok(())
    }

    fn visible(&self) -> impl Iterator<Item = &Account> {
        self.rows
            .iter()
            .filter(|row| row.has_email)
            .map(|row| &row.account)
    }

    fn apply(rows: &mut [StoredPerson], id: AccountId, active: bool) -> bool {
        match rows
            .iter_mut()
            .find(|row| row.has_email && row.account.id == id)
        {
            Some(row) => {
                row.account.active = active;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_accounts<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = Account>,
    {
        let store = Self::new();
        for account in accounts {
            store.insert(account).await;
        }
        store
    }

    pub async fn insert(&self, account: Account) -> AccountId {
        let id = account.id;
        self.state.write().await.rows.push(StoredPerson {
            account,
            has_email: true,
        });
        id
    }

    /// Insert a row whose email column is NULL
    pub async fn insert_without_email(&self, account: Account) -> AccountId {
        let id = account.id;
        self.state.write().await.rows.push(StoredPerson {
            account,
            has_email: false,
        });
        id
    }

    /// Raw row lookup, including rows hidden from the store API
    pub async fn snapshot(&self, id: AccountId) -> Option<Account> {
        self.state
            .read()
            .await
            .rows
            .iter()
            .find(|row| row.account.id == id)
            .map(|row| row.account.clone())
    }

    /// Make every call fail as if the database were unreachable
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    /// Make writes to one account fail
    pub async fn fail_writes_for(&self, id: AccountId) {
        self.state.write().await.failing_writes.insert(id);
    }

    /// Abort any batch when it reaches this account
    pub async fn interrupt_batch_at(&self, id: AccountId) {
        self.state.write().await.interrupt_at = Some(id);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn list_accounts(&self, filter: AccountFilter) -> TwofaResult<Vec<Account>> {
        let state = self.state.read().await;
        state.ensure_online()?;

        let mut accounts: Vec<Account> = state
            .visible()
            .filter(|account| filter.matches(account))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(accounts)
    }

    async fn find_by_email(&self, email: &str) -> TwofaResult<Option<Account>> {
        let state = self.state.read().await;
        state.ensure_online()?;
        let found = state.visible().find(|a| a.email == email).cloned();
        Ok(found)
    }

    async fn find_by_id(&self, id: AccountId) -> TwofaResult<Option<Account>> {
        let state = self.state.read().await;
        state.ensure_online()?;
        let found = state.visible().find(|a| a.id == id).cloned();
        Ok(found)
    }

    async fn set_active(&self, id: AccountId, active: bool) -> TwofaResult<()> {
        let mut state = self.state.write().await;
        state.ensure_online()?;

        if state.failing_writes.contains(&id) {
            return Err(write_error!(id, "injected write failure", "memory_store"));
        }
        if MemoryState::apply(&mut state.rows, id, active) {
            Ok(())
        } else {
            Err(write_error!(id, "no matching row", "memory_store"))
        }
    }

    async fn set_active_many(
        &self,
        ids: &[AccountId],
        active: bool,
    ) -> TwofaResult<Vec<RowOutcome>> {
        let mut state = self.state.write().await;
        state.ensure_online()?;

        // Work on a copy; it only replaces the live rows once every id was tried.
        let mut staged = state.rows.clone();
        let mut outcomes = Vec::with_capacity(ids.len());

        for &id in ids {
            if state.interrupt_at == Some(id) {
                return Err(storage_error!(
                    format!("batch interrupted at account {}", id),
                    "memory_store"
                ));
            }

            let result = if state.failing_writes.contains(&id) {
                Err(write_error!(id, "injected write failure", "memory_store"))
            } else if MemoryState::apply(&mut staged, id, active) {
                Ok(())
            } else {
                Err(write_error!(id, "no matching row", "memory_store"))
            };
            outcomes.push(RowOutcome { id, result });
        }

        state.rows = staged;
        Ok(outcomes)
    }
}
