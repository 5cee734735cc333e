//! Transaction orchestrator: validates an exchange request, prices it,
//! creates the provider quote + transfer, persists the pending record, and
//! starts its reconciliation poller.

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Direction, Transaction};
use crate::error::AppError;
use crate::ports::{RateSource, TransactionStore};
use crate::providers::{Payout, QuoteRequest, SettlementProvider};
use crate::services::poller::PollerRegistry;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExchangeRequest {
    pub user_id: Uuid,
    pub asset: String,
    pub network: Option<String>,
    pub amount: BigDecimal,
    pub direction: Direction,
    pub address: Option<String>,
    pub bank_id: Option<Uuid>,
}

pub struct ExchangeService {
    store: Arc<dyn TransactionStore>,
    provider: Arc<dyn SettlementProvider>,
    rates: Arc<dyn RateSource>,
    pollers: Arc<PollerRegistry>,
    margin_percent: BigDecimal,
}

/// Margin-adjusted rate. The margin always favors the platform: buyers pay a
/// marked-up NGN price per asset unit, sellers receive a marked-down one.
fn rate_with_margin(
    rate: &BigDecimal,
    margin_percent: &BigDecimal,
    direction: Direction,
) -> BigDecimal {
    let hundred = BigDecimal::from(100);
    match direction {
        Direction::CashToCrypto => rate * (&hundred + margin_percent) / &hundred,
        Direction::CryptoToCash => rate * (&hundred - margin_percent) / &hundred,
    }
}

impl ExchangeService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        provider: Arc<dyn SettlementProvider>,
        rates: Arc<dyn RateSource>,
        pollers: Arc<PollerRegistry>,
        margin_percent: BigDecimal,
    ) -> Self {
        Self {
            store,
            provider,
            rates,
            pollers,
            margin_percent,
        }
    }

    /// Creates one exchange transaction. Exactly one pending row and one
    /// poller task result from a successful call; if transfer creation fails
    /// after the quote, nothing is persisted.
    pub async fn create_transaction(
        &self,
        request: CreateExchangeRequest,
    ) -> Result<Transaction, AppError> {
        validate(&request)?;

        let asset = request.asset.to_uppercase();
        let rate = self
            .rates
            .ngn_rate(&asset)
            .await?
            .ok_or_else(|| AppError::RateUnavailable(asset.clone()))?;
        let effective_rate = rate_with_margin(&rate, &self.margin_percent, request.direction);

        let (source_currency, target_currency, converted_amount) = match request.direction {
            // NGN in, asset out: converted is in asset units at 8 dp.
            Direction::CashToCrypto => (
                "NGN".to_string(),
                asset.clone(),
                (&request.amount / &effective_rate).with_scale(8),
            ),
            // Asset in, NGN out: converted is in kobo-precision NGN.
            Direction::CryptoToCash => (
                asset.clone(),
                "NGN".to_string(),
                (&request.amount * &effective_rate).with_scale(2),
            ),
        };

        let pay_out = match request.direction {
            Direction::CashToCrypto => request.address.clone().map(|address| Payout::Crypto {
                address,
                network: request.network.clone(),
            }),
            // The Naira leg goes out through the banking rails at settlement
            // time, not through the provider.
            Direction::CryptoToCash => None,
        };

        let quote = self
            .provider
            .create_quote(QuoteRequest {
                source_currency,
                target_currency,
                source_amount: request.amount.clone(),
                pay_out,
            })
            .await?;

        let transfer = self.provider.create_transfer(&quote.id).await?;

        let mut tx = Transaction::new(
            request.user_id,
            request.direction,
            asset,
            request.network,
            request.amount,
            converted_amount,
            effective_rate,
            quote.id,
            transfer.id,
            request.address,
            request.bank_id,
        );
        if let Some(pay_in) = &transfer.pay_in {
            tx.expires_at = pay_in.expires_at;
            tx.metadata = Some(json!({ "pay_in": pay_in }));
        }

        let tx = self.store.insert(&tx).await?;
        self.pollers.spawn(tx.transfer_id.clone()).await;

        info!(
            transfer_id = %tx.transfer_id,
            user_id = %tx.user_id,
            direction = tx.direction.as_str(),
            amount = %tx.amount,
            converted_amount = %tx.converted_amount,
            "exchange transaction created"
        );

        Ok(tx)
    }
}

fn validate(request: &CreateExchangeRequest) -> Result<(), AppError> {
    if request.asset.trim().is_empty() {
        return Err(AppError::Validation("asset is required".to_string()));
    }
    if request.amount <= BigDecimal::from(0) {
        return Err(AppError::Validation(
            "amount must be positive".to_string(),
        ));
    }
    match request.direction {
        Direction::CashToCrypto if request.address.is_none() => Err(AppError::Validation(
            "address is required for cash_to_crypto".to_string(),
        )),
        Direction::CryptoToCash if request.bank_id.is_none() => Err(AppError::Validation(
            "bank_id is required for crypto_to_cash".to_string(),
        )),
        _ => Ok(()),
    }
}
