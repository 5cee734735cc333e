//! Reconciliation engine: the single state-transition function both
//! observation paths (status polling and webhook push) feed into.
//!
//! Transitions are status-conditional updates in the store, so concurrent
//! observations of the same provider event cannot double-settle: only the
//! observer whose confirmation claim wins runs the settlement executor.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{ProviderStatus, Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::TransactionStore;
use crate::services::executor::SettlementExecutor;

/// Outcome of feeding one provider-reported status into the engine.
#[derive(Debug)]
pub enum Observation {
    /// Nothing changed: the provider repeated a pre-transition status, or a
    /// terminal state was already in place.
    Noop { status: TransactionStatus },
    /// The transaction moved to `status`.
    Transitioned { status: TransactionStatus },
    /// First funds-received observation; the settlement executor ran.
    Confirmed { transaction: Transaction },
    /// Funds-received observed again after confirmation. Explicitly not an
    /// error; this is what makes the two observation paths safe to race.
    AlreadyConfirmed,
    /// Unrecognized provider status, logged and skipped.
    Ignored { raw: String },
}

impl Observation {
    /// Whether the poller for this transfer has nothing left to observe.
    pub fn halts_polling(&self) -> bool {
        match self {
            Observation::Noop { status } => status.is_terminal(),
            Observation::Transitioned { status } => status.is_terminal(),
            Observation::Confirmed { .. } | Observation::AlreadyConfirmed => true,
            Observation::Ignored { .. } => false,
        }
    }
}

pub struct ReconciliationEngine {
    store: Arc<dyn TransactionStore>,
    executor: Arc<SettlementExecutor>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn TransactionStore>, executor: Arc<SettlementExecutor>) -> Self {
        Self { store, executor }
    }

    /// Applies one observed provider status to the transaction correlated by
    /// `transfer_id`. `raw` is the provider's response body, recorded in the
    /// transaction metadata for diagnostics.
    pub async fn observe(
        &self,
        transfer_id: &str,
        provider_status: &str,
        raw: Option<&serde_json::Value>,
    ) -> Result<Observation, AppError> {
        match ProviderStatus::parse(provider_status) {
            ProviderStatus::Pending => {
                let tx = self.store.get_by_transfer_id(transfer_id).await?;
                Ok(Observation::Noop { status: tx.status })
            }

            ProviderStatus::Processing => {
                match self
                    .store
                    .transition(transfer_id, TransactionStatus::Processing)
                    .await?
                {
                    Some(tx) => {
                        self.record_observation(&tx, provider_status, raw).await?;
                        Ok(Observation::Transitioned { status: tx.status })
                    }
                    None => {
                        let tx = self.store.get_by_transfer_id(transfer_id).await?;
                        Ok(Observation::Noop { status: tx.status })
                    }
                }
            }

            ProviderStatus::Cancelled => {
                match self
                    .store
                    .transition(transfer_id, TransactionStatus::Cancelled)
                    .await?
                {
                    Some(tx) => {
                        info!(transfer_id, "transfer cancelled by provider");
                        self.record_observation(&tx, provider_status, raw).await?;
                        Ok(Observation::Transitioned { status: tx.status })
                    }
                    None => {
                        let tx = self.store.get_by_transfer_id(transfer_id).await?;
                        Ok(Observation::Noop { status: tx.status })
                    }
                }
            }

            ProviderStatus::FundsReceived => {
                match self.store.claim_confirmation(transfer_id).await? {
                    Some(tx) => {
                        info!(transfer_id, "funds received; running settlement");
                        self.record_observation(&tx, provider_status, raw).await?;
                        let transaction = self.executor.settle(tx).await?;
                        Ok(Observation::Confirmed { transaction })
                    }
                    None => {
                        let tx = self.store.get_by_transfer_id(transfer_id).await?;
                        if tx.status == TransactionStatus::Successful {
                            Ok(Observation::AlreadyConfirmed)
                        } else {
                            // Cancelled or failed before the funds showed up;
                            // terminal states are never re-entered.
                            warn!(
                                transfer_id,
                                status = tx.status.as_str(),
                                "funds-received observation for a terminal transaction"
                            );
                            Ok(Observation::Noop { status: tx.status })
                        }
                    }
                }
            }

            ProviderStatus::Unknown(raw_status) => {
                warn!(
                    transfer_id,
                    provider_status = %raw_status,
                    "ignoring unrecognized provider status"
                );
                Ok(Observation::Ignored { raw: raw_status })
            }
        }
    }

    async fn record_observation(
        &self,
        tx: &Transaction,
        provider_status: &str,
        raw: Option<&serde_json::Value>,
    ) -> Result<(), AppError> {
        let mut patch = json!({ "last_provider_status": provider_status });
        if let Some(raw) = raw {
            patch["last_provider_response"] = raw.clone();
        }
        self.store.merge_metadata(tx.id, patch).await?;
        Ok(())
    }
}
