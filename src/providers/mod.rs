//! HTTP clients for the two external money-movement providers.

pub mod rails;
pub mod settlement;

use thiserror::Error;

/// Failure surface shared by both provider clients. Calls carry no internal
/// retry; the upstream status code and message propagate to the caller.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned {status_code}: {message}")]
    Upstream { status_code: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

pub use rails::{BankRails, FundTransferRequest, FundTransferResponse, HttpBankRailsClient};
pub use settlement::{
    HttpSettlementClient, PayIn, Payout, Quote, QuoteRequest, SettlementProvider, Transfer,
    TransferStatus,
};
