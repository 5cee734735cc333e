//! Settlement executor: performs the opposite leg of a trade after inbound
//! funds are confirmed. Runs exactly once per transaction; the caller is the
//! reconciliation engine, and only the observer that won the confirmation
//! claim reaches this code.

use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    Direction, ExchangeStatus, ProviderStatus, Transaction, TransactionStatus,
};
use crate::error::AppError;
use crate::ports::{BankDirectory, TransactionStore};
use crate::providers::{
    BankRails, FundTransferRequest, Payout, QuoteRequest, SettlementProvider,
};
use crate::services::ledger::LedgerService;

/// The platform account Naira payouts are debited from.
#[derive(Debug, Clone)]
pub struct FloatAccount {
    pub name: String,
    pub number: String,
}

pub struct SettlementExecutor {
    store: Arc<dyn TransactionStore>,
    ledger: Arc<LedgerService>,
    provider: Arc<dyn SettlementProvider>,
    rails: Arc<dyn BankRails>,
    banks: Arc<dyn BankDirectory>,
    float_account: FloatAccount,
}

impl SettlementExecutor {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        ledger: Arc<LedgerService>,
        provider: Arc<dyn SettlementProvider>,
        rails: Arc<dyn BankRails>,
        banks: Arc<dyn BankDirectory>,
        float_account: FloatAccount,
    ) -> Self {
        Self {
            store,
            ledger,
            provider,
            rails,
            banks,
            float_account,
        }
    }

    /// Executes the opposite leg for a just-confirmed transaction. Provider
    /// failures are absorbed into the transaction record; only storage
    /// failures surface as errors. Not retried automatically: a failed leg
    /// must be re-driven out of band.
    pub async fn settle(&self, tx: Transaction) -> Result<Transaction, AppError> {
        info!(
            transfer_id = %tx.transfer_id,
            direction = tx.direction.as_str(),
            "settling opposite leg"
        );

        match tx.direction {
            Direction::CashToCrypto => self.settle_crypto_payout(tx).await,
            Direction::CryptoToCash => self.settle_naira_payout(tx).await,
        }
    }

    /// Sends the purchased asset to the user's address via a fresh
    /// quote + transfer at the settlement provider.
    async fn settle_crypto_payout(&self, tx: Transaction) -> Result<Transaction, AppError> {
        let address = match tx.address.clone() {
            Some(address) => address,
            None => {
                return self
                    .fail_transaction(tx.id, "no crypto destination on record")
                    .await;
            }
        };

        let payout = Payout::Crypto {
            address,
            network: tx.network.clone(),
        };
        let quote_request = QuoteRequest {
            source_currency: "NGN".to_string(),
            target_currency: tx.asset.clone(),
            source_amount: tx.amount.clone(),
            pay_out: Some(payout),
        };

        let transfer = match self.provider.create_quote(quote_request).await {
            Ok(quote) => self.provider.create_transfer(&quote.id).await,
            Err(e) => Err(e),
        };

        match transfer {
            Ok(transfer) => {
                self.store
                    .merge_metadata(
                        tx.id,
                        json!({
                            "payout_transfer": { "id": transfer.id, "status": transfer.status }
                        }),
                    )
                    .await?;

                // A terminal immediate response closes the leg; otherwise the
                // payout transfer is still in flight and exchange_status stays
                // pending.
                if ProviderStatus::parse(&transfer.status) == ProviderStatus::FundsReceived {
                    self.store
                        .set_exchange_status(tx.id, ExchangeStatus::Successful)
                        .await?;
                }

                info!(transfer_id = %tx.transfer_id, "crypto payout dispatched");
            }
            Err(e) => {
                error!(
                    transfer_id = %tx.transfer_id,
                    error = %e,
                    "crypto payout failed"
                );
                return self.fail_transaction(tx.id, &e.to_string()).await;
            }
        }

        Ok(self.store.get(tx.id).await?)
    }

    /// Pushes Naira to the user's linked bank account through the banking
    /// rails. Inbound funds are already confirmed, so a failed payout leaves
    /// the transaction successful and marks only the exchange leg failed.
    async fn settle_naira_payout(&self, tx: Transaction) -> Result<Transaction, AppError> {
        let bank = match tx.bank_id {
            Some(bank_id) => match self.banks.bank_details(bank_id).await {
                Ok(bank) => bank,
                Err(e) => {
                    return self
                        .fail_exchange_leg(tx.id, &format!("bank lookup failed: {}", e))
                        .await;
                }
            },
            None => {
                return self
                    .fail_exchange_leg(tx.id, "no linked bank account on record")
                    .await;
            }
        };

        let request = FundTransferRequest {
            amount: tx.converted_amount.clone(),
            bank_code: bank.bank_code,
            bank_name: bank.bank_name,
            credit_account_name: bank.account_name,
            credit_account_number: bank.account_number,
            debit_account_name: self.float_account.name.clone(),
            debit_account_number: self.float_account.number.clone(),
            narration: format!("{} sell payout", tx.asset),
            reference: tx.id.to_string(),
            session_id: tx.transfer_id.clone(),
        };

        match self.rails.fund_transfer(request).await {
            Ok(response) if response.is_successful() => {
                self.ledger
                    .debit(
                        tx.user_id,
                        &format!("Naira payout for transfer {}", tx.transfer_id),
                        tx.converted_amount.clone(),
                    )
                    .await?;
                self.store
                    .set_exchange_status(tx.id, ExchangeStatus::Successful)
                    .await?;
                self.store
                    .merge_metadata(
                        tx.id,
                        json!({ "rails_response_code": response.response_code }),
                    )
                    .await?;

                info!(transfer_id = %tx.transfer_id, "Naira payout completed");
            }
            Ok(response) => {
                warn!(
                    transfer_id = %tx.transfer_id,
                    response_code = %response.response_code,
                    "rails declined payout"
                );
                self.store
                    .set_exchange_status(tx.id, ExchangeStatus::Failed)
                    .await?;
                self.store
                    .merge_metadata(
                        tx.id,
                        json!({
                            "rails_response_code": response.response_code,
                            "rails_response_message": response.response_message,
                        }),
                    )
                    .await?;
            }
            Err(e) => {
                error!(transfer_id = %tx.transfer_id, error = %e, "rails call failed");
                return self.fail_exchange_leg(tx.id, &e.to_string()).await;
            }
        }

        Ok(self.store.get(tx.id).await?)
    }

    /// Terminal failure of the whole transaction (crypto payout leg).
    async fn fail_transaction(&self, id: Uuid, reason: &str) -> Result<Transaction, AppError> {
        self.store
            .set_status(id, TransactionStatus::Failed)
            .await?;
        self.store
            .set_exchange_status(id, ExchangeStatus::Failed)
            .await?;
        self.store
            .merge_metadata(id, json!({ "exchange_error": reason }))
            .await?;
        Ok(self.store.get(id).await?)
    }

    /// Failure of the payout leg only; the confirmed inbound status stands.
    async fn fail_exchange_leg(&self, id: Uuid, reason: &str) -> Result<Transaction, AppError> {
        self.store
            .set_exchange_status(id, ExchangeStatus::Failed)
            .await?;
        self.store
            .merge_metadata(id, json!({ "exchange_error": reason }))
            .await?;
        Ok(self.store.get(id).await?)
    }
}
