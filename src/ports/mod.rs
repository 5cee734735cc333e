//! Port traits separating the domain services from storage and collaborator
//! lookups. Postgres adapters implement these for production; in-memory
//! adapters implement them for tests and demos.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    EntryType, ExchangeStatus, LedgerEntry, Transaction, TransactionStatus,
};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for crate::error::AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(what) => crate::error::AppError::NotFound(what),
            other => crate::error::AppError::Internal(other.to_string()),
        }
    }
}

/// Durable record of exchange requests. Mutations are status-conditional so
/// the poll and webhook paths can race safely.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Transaction>;

    async fn get_by_transfer_id(&self, transfer_id: &str) -> RepositoryResult<Transaction>;

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Transaction>>;

    /// Conditional move to `to`, allowed only while the row is still
    /// `pending` or `processing`. Returns the updated row iff the update
    /// changed anything; `None` means a terminal state got there first.
    async fn transition(
        &self,
        transfer_id: &str,
        to: TransactionStatus,
    ) -> RepositoryResult<Option<Transaction>>;

    /// Atomic claim of the funds-received confirmation: set
    /// `status = successful` and stamp `confirmed_at`, but only while the
    /// row is `pending` or `processing`. Exactly one of any number of
    /// concurrent callers gets `Some`; the settlement executor must run only
    /// for that caller.
    async fn claim_confirmation(&self, transfer_id: &str)
        -> RepositoryResult<Option<Transaction>>;

    async fn set_status(&self, id: Uuid, status: TransactionStatus) -> RepositoryResult<()>;

    async fn set_exchange_status(
        &self,
        id: Uuid,
        status: ExchangeStatus,
    ) -> RepositoryResult<()>;

    /// Shallow-merges `patch` into the row's metadata object.
    async fn merge_metadata(&self, id: Uuid, patch: serde_json::Value) -> RepositoryResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub owner_id: Option<Uuid>,
    pub entry_type: Option<EntryType>,
}

/// Append-only ledger. No update or delete operation exists.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Appends one entry, computing its running balance from the owner's
    /// latest entry. Implementations serialize concurrent appends so two
    /// entries never derive from the same stale predecessor.
    async fn append(
        &self,
        owner_id: Uuid,
        entry_type: EntryType,
        description: &str,
        amount: BigDecimal,
    ) -> RepositoryResult<LedgerEntry>;

    async fn list(
        &self,
        filter: LedgerFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<LedgerEntry>>;

    /// Running balance of the owner's latest entry, zero if none.
    async fn balance(&self, owner_id: Uuid) -> RepositoryResult<BigDecimal>;
}

/// Linked bank account details, resolved from the stored bank record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_code: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
}

/// Collaborator lookup for users' linked bank accounts.
#[async_trait]
pub trait BankDirectory: Send + Sync {
    async fn bank_details(&self, bank_id: Uuid) -> RepositoryResult<BankDetails>;
}

/// Collaborator lookup for asset -> NGN exchange rates. `None` means no
/// current rate exists for the asset.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn ngn_rate(&self, asset: &str) -> RepositoryResult<Option<BigDecimal>>;
}
