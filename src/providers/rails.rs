//! Client for the banking-rails provider that executes Naira payouts.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ProviderError;

/// Provider-specific success code; every other code is a failure.
pub const SUCCESS_RESPONSE_CODE: &str = "00";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundTransferRequest {
    pub amount: BigDecimal,
    pub bank_code: String,
    pub bank_name: String,
    pub credit_account_name: String,
    pub credit_account_number: String,
    pub debit_account_name: String,
    pub debit_account_number: String,
    pub narration: String,
    pub reference: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundTransferResponse {
    pub response_code: String,
    pub response_message: Option<String>,
    pub transaction_reference: Option<String>,
}

impl FundTransferResponse {
    pub fn is_successful(&self) -> bool {
        self.response_code == SUCCESS_RESPONSE_CODE
    }
}

#[async_trait]
pub trait BankRails: Send + Sync {
    async fn fund_transfer(
        &self,
        request: FundTransferRequest,
    ) -> Result<FundTransferResponse, ProviderError>;
}

#[derive(Clone)]
pub struct HttpBankRailsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpBankRailsClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        HttpBankRailsClient {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl BankRails for HttpBankRailsClient {
    async fn fund_transfer(
        &self,
        request: FundTransferRequest,
    ) -> Result<FundTransferResponse, ProviderError> {
        let url = format!("{}/fundTransfer", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Upstream {
                status_code,
                message,
            });
        }

        Ok(response.json::<FundTransferResponse>().await?)
    }
}
