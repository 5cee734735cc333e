//! In-process implementations of the store ports. Same observable semantics
//! as the Postgres adapters, including an atomic confirmation claim; used by
//! the test suite and local demos.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::ledger::next_balance;
use crate::domain::{
    EntryType, ExchangeStatus, LedgerEntry, Transaction, TransactionStatus,
};
use crate::ports::{
    BankDetails, BankDirectory, LedgerFilter, LedgerStore, RateSource, RepositoryError,
    RepositoryResult, TransactionStore,
};

#[derive(Default)]
pub struct InMemoryTransactionStore {
    inner: Mutex<HashMap<Uuid, Transaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn merge_objects(target: &mut Option<serde_json::Value>, patch: serde_json::Value) {
    match target {
        Some(serde_json::Value::Object(existing)) => {
            if let serde_json::Value::Object(incoming) = patch {
                for (key, value) in incoming {
                    existing.insert(key, value);
                }
            }
        }
        _ => *target = Some(patch),
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut map = self.inner.lock().await;
        if map.values().any(|t| t.transfer_id == tx.transfer_id) {
            return Err(RepositoryError::Conflict(format!(
                "transfer {} already recorded",
                tx.transfer_id
            )));
        }
        map.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let map = self.inner.lock().await;
        map.get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn get_by_transfer_id(&self, transfer_id: &str) -> RepositoryResult<Transaction> {
        let map = self.inner.lock().await;
        map.values()
            .find(|t| t.transfer_id == transfer_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transfer {}", transfer_id)))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let map = self.inner.lock().await;
        let mut txs: Vec<Transaction> = map
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(txs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn transition(
        &self,
        transfer_id: &str,
        to: TransactionStatus,
    ) -> RepositoryResult<Option<Transaction>> {
        let mut map = self.inner.lock().await;
        let tx = map.values_mut().find(|t| t.transfer_id == transfer_id);
        match tx {
            Some(tx) if !tx.status.is_terminal() => {
                tx.status = to;
                tx.updated_at = Utc::now();
                Ok(Some(tx.clone()))
            }
            Some(_) => Ok(None),
            None => Err(RepositoryError::NotFound(format!(
                "transfer {}",
                transfer_id
            ))),
        }
    }

    async fn claim_confirmation(
        &self,
        transfer_id: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        // Check-and-set under one lock acquisition; mirrors the conditional
        // UPDATE the Postgres adapter issues.
        let mut map = self.inner.lock().await;
        let tx = map.values_mut().find(|t| t.transfer_id == transfer_id);
        match tx {
            Some(tx) if !tx.status.is_terminal() => {
                tx.status = TransactionStatus::Successful;
                tx.confirmed_at = Some(Utc::now());
                tx.updated_at = Utc::now();
                Ok(Some(tx.clone()))
            }
            Some(_) => Ok(None),
            None => Err(RepositoryError::NotFound(format!(
                "transfer {}",
                transfer_id
            ))),
        }
    }

    async fn set_status(&self, id: Uuid, status: TransactionStatus) -> RepositoryResult<()> {
        let mut map = self.inner.lock().await;
        let tx = map
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        tx.status = status;
        tx.updated_at = Utc::now();
        Ok(())
    }

    async fn set_exchange_status(
        &self,
        id: Uuid,
        status: ExchangeStatus,
    ) -> RepositoryResult<()> {
        let mut map = self.inner.lock().await;
        let tx = map
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        tx.exchange_status = status;
        tx.updated_at = Utc::now();
        Ok(())
    }

    async fn merge_metadata(&self, id: Uuid, patch: serde_json::Value) -> RepositoryResult<()> {
        let mut map = self.inner.lock().await;
        let tx = map
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        merge_objects(&mut tx.metadata, patch);
        tx.updated_at = Utc::now();
        Ok(())
    }
}

/// Appends are serialized globally by the single mutex, which also satisfies
/// the per-owner requirement.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(
        &self,
        owner_id: Uuid,
        entry_type: EntryType,
        description: &str,
        amount: BigDecimal,
    ) -> RepositoryResult<LedgerEntry> {
        let mut entries = self.entries.lock().await;
        let prev = entries
            .iter()
            .rev()
            .find(|e| e.owner_id == owner_id)
            .map(|e| e.running_balance.clone())
            .unwrap_or_else(|| BigDecimal::from(0));

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            owner_id,
            entry_type,
            description: description.to_string(),
            running_balance: next_balance(&prev, entry_type, &amount),
            amount,
            created_at: Utc::now(),
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list(
        &self,
        filter: LedgerFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<LedgerEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| filter.owner_id.map_or(true, |o| e.owner_id == o))
            .filter(|e| filter.entry_type.map_or(true, |t| e.entry_type == t))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn balance(&self, owner_id: Uuid) -> RepositoryResult<BigDecimal> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .rev()
            .find(|e| e.owner_id == owner_id)
            .map(|e| e.running_balance.clone())
            .unwrap_or_else(|| BigDecimal::from(0)))
    }
}

#[derive(Default)]
pub struct StaticBankDirectory {
    banks: HashMap<Uuid, BankDetails>,
}

impl StaticBankDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bank(mut self, bank_id: Uuid, details: BankDetails) -> Self {
        self.banks.insert(bank_id, details);
        self
    }
}

#[async_trait]
impl BankDirectory for StaticBankDirectory {
    async fn bank_details(&self, bank_id: Uuid) -> RepositoryResult<BankDetails> {
        self.banks
            .get(&bank_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("bank account {}", bank_id)))
    }
}

/// Fixed asset -> NGN rate table, loaded from configuration.
#[derive(Default)]
pub struct StaticRateTable {
    rates: HashMap<String, BigDecimal>,
}

impl StaticRateTable {
    pub fn new(rates: HashMap<String, BigDecimal>) -> Self {
        Self { rates }
    }

    pub fn with_rate(mut self, asset: &str, rate: BigDecimal) -> Self {
        self.rates.insert(asset.to_uppercase(), rate);
        self
    }
}

#[async_trait]
impl RateSource for StaticRateTable {
    async fn ngn_rate(&self, asset: &str) -> RepositoryResult<Option<BigDecimal>> {
        Ok(self.rates.get(&asset.to_uppercase()).cloned())
    }
}
