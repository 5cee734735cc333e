//! Transaction domain entity.
//! Framework-agnostic representation of one crypto <-> NGN exchange request.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which way money moves: NGN in / crypto out, or crypto in / NGN out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    CashToCrypto,
    CryptoToCash,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::CashToCrypto => "cash_to_crypto",
            Direction::CryptoToCash => "crypto_to_cash",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cash_to_crypto" => Some(Direction::CashToCrypto),
            "crypto_to_cash" => Some(Direction::CryptoToCash),
            _ => None,
        }
    }
}

/// Inbound-funds lifecycle. Monotonic: once terminal, a transaction never
/// re-enters `Pending` or `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Successful,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Successful => "successful",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "processing" => Some(TransactionStatus::Processing),
            "successful" => Some(TransactionStatus::Successful),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Successful
                | TransactionStatus::Failed
                | TransactionStatus::Cancelled
        )
    }
}

/// Opposite-leg settlement status, tracked independently of the
/// inbound-funds status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    Pending,
    Successful,
    Failed,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "pending",
            ExchangeStatus::Successful => "successful",
            ExchangeStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ExchangeStatus::Pending),
            "successful" => Some(ExchangeStatus::Successful),
            "failed" => Some(ExchangeStatus::Failed),
            _ => None,
        }
    }
}

/// Status vocabulary reported by the settlement provider. Several raw values
/// all mean "the user's funds arrived"; anything unrecognized is carried as
/// `Unknown` and ignored by the reconciliation engine rather than treated as
/// an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Pending,
    Processing,
    Cancelled,
    FundsReceived,
    Unknown(String),
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => ProviderStatus::Pending,
            "processing" => ProviderStatus::Processing,
            "cancelled" => ProviderStatus::Cancelled,
            "funds_received" | "completed" | "delivered" | "successful" => {
                ProviderStatus::FundsReceived
            }
            other => ProviderStatus::Unknown(other.to_string()),
        }
    }
}

/// One exchange request, correlated to the provider by `transfer_id`.
/// Financial record: rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub direction: Direction,
    pub asset: String,
    pub network: Option<String>,
    /// Source-currency units: NGN for cash_to_crypto, asset units otherwise.
    pub amount: BigDecimal,
    /// Target-currency units at `exchange_rate`.
    pub converted_amount: BigDecimal,
    pub exchange_rate: BigDecimal,
    pub quote_id: String,
    /// Provider-assigned, unique. Idempotency key for both poll and webhook.
    pub transfer_id: String,
    pub address: Option<String>,
    pub bank_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub exchange_status: ExchangeStatus,
    /// Snapshot of the last provider response(s). Diagnostic only, never
    /// consulted for control decisions.
    pub metadata: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        direction: Direction,
        asset: String,
        network: Option<String>,
        amount: BigDecimal,
        converted_amount: BigDecimal,
        exchange_rate: BigDecimal,
        quote_id: String,
        transfer_id: String,
        address: Option<String>,
        bank_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            direction,
            asset,
            network,
            amount,
            converted_amount,
            exchange_rate,
            quote_id,
            transfer_id,
            address,
            bank_id,
            status: TransactionStatus::Pending,
            exchange_status: ExchangeStatus::Pending,
            metadata: None,
            expires_at: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
