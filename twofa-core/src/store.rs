//! Account directory access
//!
//! The host application owns the schema; stores only read accounts and flip
//! their `active` flag.

pub mod memory;
pub mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PostgresAccountStore;

use crate::account::{Account, AccountId};
use crate::error::TwofaResult;
use async_trait::async_trait;

/// Row selection for [`AccountStore::list_accounts`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub active: Option<bool>,
    pub has_2fa: Option<bool>,
}

impl AccountFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Accounts that enforcement would disable, before exemptions
    pub fn active_without_2fa() -> Self {
        Self {
            active: Some(true),
            has_2fa: Some(false),
        }
    }

    pub fn matches(&self, account: &Account) -> bool {
        self.active.map_or(true, |a| account.active == a)
            && self.has_2fa.map_or(true, |h| account.has_2fa() == h)
    }
}

/// Result of one row inside a batch update
#[derive(Debug)]
pub struct RowOutcome {
    pub id: AccountId,
    pub result: TwofaResult<()>,
}

impl RowOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Accounts with an email, ordered by email ascending
    async fn list_accounts(&self, filter: AccountFilter) -> TwofaResult<Vec<Account>>;

    /// Exact email match
    async fn find_by_email(&self, email: &str) -> TwofaResult<Option<Account>>;

    async fn find_by_id(&self, id: AccountId) -> TwofaResult<Option<Account>>;

    /// Update a single account and commit immediately
    async fn set_active(&self, id: AccountId, active: bool) -> TwofaResult<()>;

    /// Update several accounts as one unit of work.
    ///
    /// A failing row is reported in its [`RowOutcome`] and does not stop the
    /// others; the successful rows are committed together. An `Err` means the
    /// batch itself broke down and nothing was committed.
    async fn set_active_many(
        &self,
        ids: &[AccountId],
        active: bool,
    ) -> TwofaResult<Vec<RowOutcome>>;
}
