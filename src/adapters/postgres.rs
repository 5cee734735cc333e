//! Postgres implementations of the store ports.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::ledger::next_balance;
use crate::domain::{
    Direction, EntryType, ExchangeStatus, LedgerEntry, Transaction, TransactionStatus,
};
use crate::ports::{
    BankDetails, BankDirectory, LedgerFilter, LedgerStore, RepositoryError, RepositoryResult,
    TransactionStore,
};

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
}

fn storage(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    direction: String,
    asset: String,
    network: Option<String>,
    amount: BigDecimal,
    converted_amount: BigDecimal,
    exchange_rate: BigDecimal,
    quote_id: String,
    transfer_id: String,
    address: Option<String>,
    bank_id: Option<Uuid>,
    status: String,
    exchange_status: String,
    metadata: Option<serde_json::Value>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
    confirmed_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let direction = Direction::from_str(&self.direction)
            .ok_or_else(|| RepositoryError::Storage(format!("bad direction {}", self.direction)))?;
        let status = TransactionStatus::from_str(&self.status)
            .ok_or_else(|| RepositoryError::Storage(format!("bad status {}", self.status)))?;
        let exchange_status = ExchangeStatus::from_str(&self.exchange_status).ok_or_else(|| {
            RepositoryError::Storage(format!("bad exchange status {}", self.exchange_status))
        })?;

        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            direction,
            asset: self.asset,
            network: self.network,
            amount: self.amount,
            converted_amount: self.converted_amount,
            exchange_rate: self.exchange_rate,
            quote_id: self.quote_id,
            transfer_id: self.transfer_id,
            address: self.address,
            bank_id: self.bank_id,
            status,
            exchange_status,
            metadata: self.metadata,
            expires_at: self.expires_at,
            confirmed_at: self.confirmed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const TRANSACTION_COLUMNS: &str = "id, user_id, direction, asset, network, amount, \
     converted_amount, exchange_rate, quote_id, transfer_id, address, bank_id, status, \
     exchange_status, metadata, expires_at, confirmed_at, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, user_id, direction, asset, network, amount, converted_amount,
                exchange_rate, quote_id, transfer_id, address, bank_id, status,
                exchange_status, metadata, expires_at, confirmed_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.user_id)
        .bind(tx.direction.as_str())
        .bind(&tx.asset)
        .bind(&tx.network)
        .bind(&tx.amount)
        .bind(&tx.converted_amount)
        .bind(&tx.exchange_rate)
        .bind(&tx.quote_id)
        .bind(&tx.transfer_id)
        .bind(&tx.address)
        .bind(tx.bank_id)
        .bind(tx.status.as_str())
        .bind(tx.exchange_status.as_str())
        .bind(&tx.metadata)
        .bind(tx.expires_at)
        .bind(tx.confirmed_at)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        row.into_domain()
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row =
            sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;

        row.map(TransactionRow::into_domain)
            .transpose()?
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn get_by_transfer_id(&self, transfer_id: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE transfer_id = $1",
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(TransactionRow::into_domain)
            .transpose()?
            .ok_or_else(|| RepositoryError::NotFound(format!("transfer {}", transfer_id)))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn transition(
        &self,
        transfer_id: &str,
        to: TransactionStatus,
    ) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions SET status = $2, updated_at = NOW() \
             WHERE transfer_id = $1 AND status IN ('pending', 'processing') \
             RETURNING *",
        )
        .bind(transfer_id)
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn claim_confirmation(
        &self,
        transfer_id: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        // Single conditional UPDATE: of any number of concurrent observers,
        // exactly one gets the row back and runs the settlement executor.
        let row = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions \
             SET status = 'successful', confirmed_at = NOW(), updated_at = NOW() \
             WHERE transfer_id = $1 AND status IN ('pending', 'processing') \
             RETURNING *",
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn set_status(&self, id: Uuid, status: TransactionStatus) -> RepositoryResult<()> {
        let result =
            sqlx::query("UPDATE transactions SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status.as_str())
                .execute(&self.pool)
                .await
                .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }

    async fn set_exchange_status(
        &self,
        id: Uuid,
        status: ExchangeStatus,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE transactions SET exchange_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }

    async fn merge_metadata(&self, id: Uuid, patch: serde_json::Value) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE transactions \
             SET metadata = COALESCE(metadata, '{}'::jsonb) || $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    owner_id: Uuid,
    entry_type: String,
    description: String,
    amount: BigDecimal,
    running_balance: BigDecimal,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl LedgerRow {
    fn into_domain(self) -> RepositoryResult<LedgerEntry> {
        let entry_type = EntryType::from_str(&self.entry_type).ok_or_else(|| {
            RepositoryError::Storage(format!("bad entry type {}", self.entry_type))
        })?;

        Ok(LedgerEntry {
            id: self.id,
            owner_id: self.owner_id,
            entry_type,
            description: self.description,
            amount: self.amount,
            running_balance: self.running_balance,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn append(
        &self,
        owner_id: Uuid,
        entry_type: EntryType,
        description: &str,
        amount: BigDecimal,
    ) -> RepositoryResult<LedgerEntry> {
        let mut db_tx = self.pool.begin().await.map_err(storage)?;

        // Advisory lock serializes appends per owner for the duration of the
        // transaction; two concurrent entries cannot both read the same
        // predecessor balance.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(owner_id.to_string())
            .execute(&mut *db_tx)
            .await
            .map_err(storage)?;

        let prev: Option<BigDecimal> = sqlx::query_scalar(
            "SELECT running_balance FROM ledger_entries \
             WHERE owner_id = $1 ORDER BY seq DESC LIMIT 1",
        )
        .bind(owner_id)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(storage)?;

        let prev = prev.unwrap_or_else(|| BigDecimal::from(0));
        let running_balance = next_balance(&prev, entry_type, &amount);

        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            INSERT INTO ledger_entries (
                id, owner_id, entry_type, description, amount, running_balance, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, owner_id, entry_type, description, amount, running_balance, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(entry_type.as_str())
        .bind(description)
        .bind(&amount)
        .bind(&running_balance)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(storage)?;

        db_tx.commit().await.map_err(storage)?;

        row.into_domain()
    }

    async fn list(
        &self,
        filter: LedgerFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            "SELECT id, owner_id, entry_type, description, amount, running_balance, created_at \
             FROM ledger_entries \
             WHERE ($1::uuid IS NULL OR owner_id = $1) \
               AND ($2::text IS NULL OR entry_type = $2) \
             ORDER BY seq DESC LIMIT $3 OFFSET $4",
        )
        .bind(filter.owner_id)
        .bind(filter.entry_type.map(|t| t.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(LedgerRow::into_domain).collect()
    }

    async fn balance(&self, owner_id: Uuid) -> RepositoryResult<BigDecimal> {
        let balance: Option<BigDecimal> = sqlx::query_scalar(
            "SELECT running_balance FROM ledger_entries \
             WHERE owner_id = $1 ORDER BY seq DESC LIMIT 1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(balance.unwrap_or_else(|| BigDecimal::from(0)))
    }
}

#[derive(Clone)]
pub struct PostgresBankDirectory {
    pool: PgPool,
}

impl PostgresBankDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BankDirectory for PostgresBankDirectory {
    async fn bank_details(&self, bank_id: Uuid) -> RepositoryResult<BankDetails> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT bank_code, bank_name, account_name, account_number \
             FROM bank_accounts WHERE id = $1",
        )
        .bind(bank_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(
            |(bank_code, bank_name, account_name, account_number)| BankDetails {
                bank_code,
                bank_name,
                account_name,
                account_number,
            },
        )
        .ok_or_else(|| RepositoryError::NotFound(format!("bank account {}", bank_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> PgPool {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test DB");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations on test DB");
        pool
    }

    fn sample_transaction() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            Direction::CashToCrypto,
            "USDT".to_string(),
            Some("TRC20".to_string()),
            BigDecimal::from(10000),
            "6.63".parse().unwrap(),
            "1507.5".parse().unwrap(),
            "qt_pg".to_string(),
            Uuid::new_v4().to_string(),
            Some("TXk49f".to_string()),
            None,
        )
    }

    #[tokio::test]
    #[ignore]
    async fn test_insert_and_get_by_transfer_id() {
        let pool = setup_test_db().await;
        let store = PostgresTransactionStore::new(pool);

        let tx = sample_transaction();
        let inserted = store.insert(&tx).await.unwrap();
        let fetched = store.get_by_transfer_id(&tx.transfer_id).await.unwrap();

        assert_eq!(fetched.id, inserted.id);
        assert_eq!(fetched.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    #[ignore]
    async fn test_claim_confirmation_wins_once() {
        let pool = setup_test_db().await;
        let store = PostgresTransactionStore::new(pool);

        let tx = sample_transaction();
        store.insert(&tx).await.unwrap();

        let first = store.claim_confirmation(&tx.transfer_id).await.unwrap();
        let second = store.claim_confirmation(&tx.transfer_id).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_ledger_append_scopes_balance_per_owner() {
        let pool = setup_test_db().await;
        let store = PostgresLedgerStore::new(pool);

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store
            .append(alice, EntryType::Credit, "seed", BigDecimal::from(500))
            .await
            .unwrap();
        let entry = store
            .append(bob, EntryType::Credit, "seed", BigDecimal::from(20))
            .await
            .unwrap();

        assert_eq!(entry.running_balance, BigDecimal::from(20));
    }
}
