//! Ledger service: validated credit/debit appends over a `LedgerStore`.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{EntryType, LedgerEntry};
use crate::error::AppError;
use crate::ports::{LedgerFilter, LedgerStore};

pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn credit(
        &self,
        owner_id: Uuid,
        description: &str,
        amount: BigDecimal,
    ) -> Result<LedgerEntry, AppError> {
        self.append(owner_id, EntryType::Credit, description, amount)
            .await
    }

    pub async fn debit(
        &self,
        owner_id: Uuid,
        description: &str,
        amount: BigDecimal,
    ) -> Result<LedgerEntry, AppError> {
        self.append(owner_id, EntryType::Debit, description, amount)
            .await
    }

    async fn append(
        &self,
        owner_id: Uuid,
        entry_type: EntryType,
        description: &str,
        amount: BigDecimal,
    ) -> Result<LedgerEntry, AppError> {
        if amount <= BigDecimal::from(0) {
            return Err(AppError::Validation(
                "ledger amount must be positive".to_string(),
            ));
        }

        let entry = self
            .store
            .append(owner_id, entry_type, description, amount)
            .await?;

        tracing::info!(
            owner_id = %owner_id,
            entry_type = entry_type.as_str(),
            amount = %entry.amount,
            running_balance = %entry.running_balance,
            "ledger entry appended"
        );

        Ok(entry)
    }

    pub async fn list_entries(
        &self,
        filter: LedgerFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        Ok(self.store.list(filter, limit, offset).await?)
    }

    pub async fn balance(&self, owner_id: Uuid) -> Result<BigDecimal, AppError> {
        Ok(self.store.balance(owner_id).await?)
    }
}
