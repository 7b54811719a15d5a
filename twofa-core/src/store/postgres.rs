//! Postgres-backed account store over the host application's `person` table

use super::{AccountFilter, AccountStore, RowOutcome};
use crate::account::{Account, AccountId};
use crate::config::DatabaseConfig;
use crate::error::{ErrorContext, TwofaError, TwofaResult};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, PgPool, Postgres, QueryBuilder,
};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const PERSON_COLUMNS: &str = "id, email, first_name, last_name, \
    COALESCE(active, FALSE) AS active, \
    COALESCE(role::text, '') AS role, \
    COALESCE(totp_enabled, FALSE) AS totp_enabled, \
    COALESCE(email_otp_enabled, FALSE) AS email_otp_enabled, \
    COALESCE(fido_enabled, FALSE) AS fido_enabled";

const HAS_2FA_SQL: &str = "(COALESCE(totp_enabled, FALSE) \
    OR COALESCE(email_otp_enabled, FALSE) \
    OR COALESCE(fido_enabled, FALSE))";

const UPDATE_ACTIVE_SQL: &str = "UPDATE person SET active = $1 WHERE id = $2";

/// Database row for the person table
#[derive(Debug, sqlx::FromRow)]
struct PersonRecord {
    id: Uuid,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    active: bool,
    role: String,
    totp_enabled: bool,
    email_otp_enabled: bool,
    fido_enabled: bool,
}

impl From<PersonRecord> for Account {
    fn from(record: PersonRecord) -> Self {
        Account {
            id: AccountId::from(record.id),
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            active: record.active,
            role: record.role,
            totp_enabled: record.totp_enabled,
            email_otp_enabled: record.email_otp_enabled,
            fido_enabled: record.fido_enabled,
        }
    }
}

/// Map a driver error, separating "cannot reach the database" from the rest
fn storage_failure(operation: &str, error: sqlx::Error) -> TwofaError {
    let context = ErrorContext::new("postgres_store").with_operation(operation);
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => TwofaError::StorageConnect {
            message: error.to_string(),
            source: Some(Box::new(error)),
            context: context.with_suggestion("Check DB_HOST, DB_PORT and that Postgres is running"),
        },
        _ => TwofaError::Storage {
            message: error.to_string(),
            source: Some(Box::new(error)),
            context,
        },
    }
}

fn row_failure(id: AccountId, error: sqlx::Error) -> TwofaError {
    TwofaError::StorageWrite {
        account: id.to_string(),
        message: error.to_string(),
        source: Some(Box::new(error)),
        context: ErrorContext::new("postgres_store").with_operation("set_active"),
    }
}

fn missing_row(id: AccountId) -> TwofaError {
    TwofaError::StorageWrite {
        account: id.to_string(),
        message: "no matching row".to_string(),
        source: None,
        context: ErrorContext::new("postgres_store").with_operation("set_active"),
    }
}

/// SELECT over the person table for a filter
fn list_query(filter: AccountFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM person WHERE email IS NOT NULL",
        PERSON_COLUMNS
    ));

    if let Some(active) = filter.active {
        builder.push(" AND COALESCE(active, FALSE) = ");
        builder.push_bind(active);
    }

    match filter.has_2fa {
        Some(true) => {
            builder.push(" AND ");
            builder.push(HAS_2FA_SQL);
        }
        Some(false) => {
            builder.push(" AND NOT ");
            builder.push(HAS_2FA_SQL);
        }
        None => {}
    }

    builder.push(" ORDER BY email");
    builder
}

fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
}

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    /// Connect to the database described by `config`
    pub async fn connect(config: &DatabaseConfig) -> TwofaResult<Self> {
        info!("Connecting to account database {}", config.target());

        let options = connect_options(config);

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| TwofaError::StorageConnect {
                message: format!("Error connecting to database {}: {}", config.target(), e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("postgres_store")
                    .with_operation("connect")
                    .with_suggestion("Check DB_HOST, DB_USER, DB_PASSWORD and DB_DB"),
            })?;

        Ok(Self { pool })
    }

    /// Build a pool that opens connections on first use.
    ///
    /// Long-running services start even while the database is down; each
    /// lookup then reports its own connection failure.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = connect_options(config);

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy_with(options);

        Self { pool }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn list_accounts(&self, filter: AccountFilter) -> TwofaResult<Vec<Account>> {
        let mut query = list_query(filter);
        let records = query
            .build_query_as::<PersonRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_failure("list_accounts", e))?;

        debug!("Fetched {} accounts for {:?}", records.len(), filter);
        Ok(records.into_iter().map(Account::from).collect())
    }

    async fn find_by_email(&self, email: &str) -> TwofaResult<Option<Account>> {
        let sql = format!("SELECT {} FROM person WHERE email = $1", PERSON_COLUMNS);
        let record = sqlx::query_as::<_, PersonRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_failure("find_by_email", e))?;

        Ok(record.map(Account::from))
    }

    async fn find_by_id(&self, id: AccountId) -> TwofaResult<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM person WHERE id = $1 AND email IS NOT NULL",
            PERSON_COLUMNS
        );
        let record = sqlx::query_as::<_, PersonRecord>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_failure("find_by_id", e))?;

        Ok(record.map(Account::from))
    }

    async fn set_active(&self, id: AccountId, active: bool) -> TwofaResult<()> {
        let done = sqlx::query(UPDATE_ACTIVE_SQL)
            .bind(active)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                    storage_failure("set_active", e)
                }
                other => row_failure(id, other),
            })?;

        if done.rows_affected() == 0 {
            return Err(missing_row(id));
        }
        Ok(())
    }

    async fn set_active_many(
        &self,
        ids: &[AccountId],
        active: bool,
    ) -> TwofaResult<Vec<RowOutcome>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_failure("begin_batch", e))?;
        let mut outcomes = Vec::with_capacity(ids.len());

        for &id in ids {
            // One savepoint per row: a failed UPDATE must not poison the batch.
            let mut savepoint = tx
                .begin()
                .await
                .map_err(|e| storage_failure("savepoint", e))?;

            let result = sqlx::query(UPDATE_ACTIVE_SQL)
                .bind(active)
                .bind(id.as_uuid())
                .execute(&mut *savepoint)
                .await;

            let outcome = match result {
                Ok(done) if done.rows_affected() > 0 => {
                    savepoint
                        .commit()
                        .await
                        .map_err(|e| storage_failure("release_savepoint", e))?;
                    Ok(())
                }
                Ok(_) => {
                    savepoint
                        .rollback()
                        .await
                        .map_err(|e| storage_failure("rollback_savepoint", e))?;
                    Err(missing_row(id))
                }
                Err(e) => {
                    savepoint
                        .rollback()
                        .await
                        .map_err(|e| storage_failure("rollback_savepoint", e))?;
                    Err(row_failure(id, e))
                }
            };
            outcomes.push(RowOutcome {
                id,
                result: outcome,
            });
        }

        tx.commit()
            .await
            .map_err(|e| storage_failure("commit_batch", e))?;
        Ok(outcomes)
    }
}
