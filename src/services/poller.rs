//! Reconciliation poller: one cancellable timer task per in-flight transfer,
//! feeding provider status lookups into the reconciliation engine.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::domain::TransactionStatus;
use crate::ports::TransactionStore;
use crate::providers::SettlementProvider;
use crate::services::reconciliation::ReconciliationEngine;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between status lookups.
    pub interval: Duration,
    /// Hard deadline after which a still-pending transaction is
    /// auto-cancelled and the task exits.
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Registry of running poll tasks keyed by transfer id. Tasks remove
/// themselves when they stop; `cancel` stops one early (used when the
/// webhook path reaches a terminal outcome first).
pub struct PollerRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn SettlementProvider>,
    engine: Arc<ReconciliationEngine>,
    store: Arc<dyn TransactionStore>,
    config: PollerConfig,
    tasks: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl PollerRegistry {
    pub fn new(
        provider: Arc<dyn SettlementProvider>,
        engine: Arc<ReconciliationEngine>,
        store: Arc<dyn TransactionStore>,
        config: PollerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                engine,
                store,
                config,
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Starts the poll task for a transfer. One task per transfer id.
    pub async fn spawn(&self, transfer_id: String) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.inner
            .tasks
            .lock()
            .await
            .insert(transfer_id.clone(), cancel_tx);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.poll_loop(&transfer_id, cancel_rx).await;
            inner.tasks.lock().await.remove(&transfer_id);
        });
    }

    /// Signals a running task to stop. No-op if the task already exited.
    pub async fn cancel(&self, transfer_id: &str) {
        if let Some(cancel) = self.inner.tasks.lock().await.remove(transfer_id) {
            let _ = cancel.send(true);
            debug!(transfer_id, "poller cancelled");
        }
    }

    pub async fn active_count(&self) -> usize {
        self.inner.tasks.lock().await.len()
    }
}

impl Inner {
    async fn poll_loop(&self, transfer_id: &str, mut cancel: watch::Receiver<bool>) {
        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let mut ticker = tokio::time::interval(self.config.interval);
        // A tick lost to a slow provider call is skipped, not replayed in a
        // burst.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(transfer_id, "reconciliation poller started");

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    debug!(transfer_id, "poller stopping on cancel signal");
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.expire(transfer_id).await;
                    return;
                }
                _ = ticker.tick() => {
                    if self.tick(transfer_id).await {
                        return;
                    }
                }
            }
        }
    }

    /// One status lookup. Returns true when polling is finished. Provider
    /// errors never stop the task; the next tick retries.
    async fn tick(&self, transfer_id: &str) -> bool {
        let status = match self.provider.get_transfer_status(transfer_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(transfer_id, error = %e, "status poll failed; retrying next tick");
                return false;
            }
        };

        match self
            .engine
            .observe(transfer_id, &status.status, Some(&status.raw))
            .await
        {
            Ok(outcome) if outcome.halts_polling() => {
                info!(transfer_id, outcome = ?outcome, "poller reached terminal outcome");
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(transfer_id, error = %e, "reconciliation failed; retrying next tick");
                false
            }
        }
    }

    /// Deadline handling: a transaction the provider never moved past
    /// pending is force-cancelled and annotated.
    async fn expire(&self, transfer_id: &str) {
        let tx = match self.store.get_by_transfer_id(transfer_id).await {
            Ok(tx) => tx,
            Err(e) => {
                error!(transfer_id, error = %e, "expiry lookup failed");
                return;
            }
        };

        if tx.status != TransactionStatus::Pending {
            info!(
                transfer_id,
                status = tx.status.as_str(),
                "poll deadline reached; leaving non-pending transaction as is"
            );
            return;
        }

        match self
            .store
            .transition(transfer_id, TransactionStatus::Cancelled)
            .await
        {
            Ok(Some(tx)) => {
                if let Err(e) = self
                    .store
                    .merge_metadata(tx.id, json!({ "auto_cancelled": true }))
                    .await
                {
                    error!(transfer_id, error = %e, "failed to annotate auto-cancel");
                }
                info!(transfer_id, "transaction auto-cancelled after poll deadline");
            }
            // A terminal transition won between the check and the update.
            Ok(None) => {}
            Err(e) => error!(transfer_id, error = %e, "auto-cancel failed"),
        }
    }
}
