//! Client for the custodial settlement provider: quote creation, transfer
//! creation, and transfer status lookup.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ProviderError;

/// Where the provider should deliver the target-currency leg.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payout {
    Crypto {
        address: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        network: Option<String>,
    },
    Bank {
        bank_code: String,
        account_number: String,
        account_name: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteRequest {
    pub source_currency: String,
    pub target_currency: String,
    pub source_amount: BigDecimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_out: Option<Payout>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Quote {
    pub id: String,
}

/// Where the user must send the source-currency leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayIn {
    pub address: Option<String>,
    pub network: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub status: String,
    pub pay_in: Option<PayIn>,
}

/// Status lookup result. `raw` is the full provider body, kept for the
/// transaction's diagnostic metadata.
#[derive(Debug, Clone)]
pub struct TransferStatus {
    pub status: String,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait SettlementProvider: Send + Sync {
    async fn create_quote(&self, request: QuoteRequest) -> Result<Quote, ProviderError>;

    async fn create_transfer(&self, quote_id: &str) -> Result<Transfer, ProviderError>;

    async fn get_transfer_status(
        &self,
        transfer_id: &str,
    ) -> Result<TransferStatus, ProviderError>;
}

/// HTTP implementation. Calls go through a circuit breaker so a provider
/// outage fails fast instead of stacking 30s timeouts across every poller.
#[derive(Clone)]
pub struct HttpSettlementClient {
    client: Client,
    base_url: String,
    api_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpSettlementClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(5, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HttpSettlementClient {
            client,
            base_url,
            api_key,
            circuit_breaker,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn guarded<F, T>(&self, fut: F) -> Result<T, ProviderError>
    where
        F: std::future::Future<Output = Result<T, ProviderError>>,
    {
        match self.circuit_breaker.call(fut).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(ProviderError::CircuitBreakerOpen(
                "settlement provider circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

async fn read_error(response: reqwest::Response) -> ProviderError {
    let status_code = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    ProviderError::Upstream {
        status_code,
        message,
    }
}

#[async_trait]
impl SettlementProvider for HttpSettlementClient {
    async fn create_quote(&self, request: QuoteRequest) -> Result<Quote, ProviderError> {
        let client = self.client.clone();
        let url = self.url("/quotes");
        let api_key = self.api_key.clone();

        self.guarded(async move {
            let response = client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(read_error(response).await);
            }

            Ok(response.json::<Quote>().await?)
        })
        .await
    }

    async fn create_transfer(&self, quote_id: &str) -> Result<Transfer, ProviderError> {
        let client = self.client.clone();
        let url = self.url("/transfers");
        let api_key = self.api_key.clone();
        let body = serde_json::json!({ "quote_id": quote_id });

        self.guarded(async move {
            let response = client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(read_error(response).await);
            }

            Ok(response.json::<Transfer>().await?)
        })
        .await
    }

    async fn get_transfer_status(
        &self,
        transfer_id: &str,
    ) -> Result<TransferStatus, ProviderError> {
        let client = self.client.clone();
        let url = self.url(&format!("/transfers/{}", transfer_id));
        let api_key = self.api_key.clone();

        self.guarded(async move {
            let response = client.get(&url).bearer_auth(&api_key).send().await?;

            if !response.status().is_success() {
                return Err(read_error(response).await);
            }

            let raw = response.json::<serde_json::Value>().await?;
            let status = raw
                .get("status")
                .and_then(|s| s.as_str())
                .ok_or_else(|| {
                    ProviderError::InvalidResponse("transfer body has no status field".to_string())
                })?
                .to_string();

            Ok(TransferStatus { status, raw })
        })
        .await
    }
}
