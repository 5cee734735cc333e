//! Shared test harness: in-memory stores wired to programmable stub
//! providers, mirroring the production object graph in `build_state`.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bigdecimal::BigDecimal;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use naira_bridge::AppState;
use naira_bridge::adapters::memory::{
    InMemoryLedgerStore, InMemoryTransactionStore, StaticBankDirectory, StaticRateTable,
};
use naira_bridge::config::Config;
use naira_bridge::domain::{Direction, Transaction};
use naira_bridge::ports::{BankDetails, TransactionStore};
use naira_bridge::providers::{
    BankRails, FundTransferRequest, FundTransferResponse, PayIn, ProviderError, Quote,
    QuoteRequest, SettlementProvider, Transfer, TransferStatus,
};
use naira_bridge::services::{
    ExchangeService, FloatAccount, LedgerService, PollerConfig, PollerRegistry,
    ReconciliationEngine, SettlementExecutor,
};

pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Settlement provider stub. `status` drives status lookups;
/// `transfer_status` is the immediate status of newly created transfers.
pub struct StubSettlementProvider {
    status: Mutex<String>,
    transfer_status: Mutex<String>,
    fail_transfer_creation: AtomicBool,
    fail_status_lookups: AtomicBool,
    counter: AtomicUsize,
    pub quote_calls: AtomicUsize,
    pub transfer_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl StubSettlementProvider {
    pub fn new() -> Self {
        Self {
            status: Mutex::new("pending".to_string()),
            transfer_status: Mutex::new("pending".to_string()),
            fail_transfer_creation: AtomicBool::new(false),
            fail_status_lookups: AtomicBool::new(false),
            counter: AtomicUsize::new(0),
            quote_calls: AtomicUsize::new(0),
            transfer_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: &str) {
        *self.status.lock().unwrap() = status.to_string();
    }

    pub fn set_transfer_status(&self, status: &str) {
        *self.transfer_status.lock().unwrap() = status.to_string();
    }

    pub fn fail_transfer_creation(&self, fail: bool) {
        self.fail_transfer_creation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status_lookups(&self, fail: bool) {
        self.fail_status_lookups.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettlementProvider for StubSettlementProvider {
    async fn create_quote(&self, _request: QuoteRequest) -> Result<Quote, ProviderError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Quote {
            id: format!("qt_{}", n),
        })
    }

    async fn create_transfer(&self, _quote_id: &str) -> Result<Transfer, ProviderError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_transfer_creation.load(Ordering::SeqCst) {
            return Err(ProviderError::Upstream {
                status_code: 422,
                message: "quote expired".to_string(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Transfer {
            id: format!("tr_{}", n),
            status: self.transfer_status.lock().unwrap().clone(),
            pay_in: Some(PayIn {
                address: Some("TDepositAddr99".to_string()),
                network: Some("TRC20".to_string()),
                expires_at: Some(Utc::now() + chrono::Duration::minutes(30)),
            }),
        })
    }

    async fn get_transfer_status(
        &self,
        transfer_id: &str,
    ) -> Result<TransferStatus, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status_lookups.load(Ordering::SeqCst) {
            return Err(ProviderError::Upstream {
                status_code: 503,
                message: "status endpoint down".to_string(),
            });
        }
        let status = self.status.lock().unwrap().clone();
        Ok(TransferStatus {
            raw: json!({ "id": transfer_id, "status": status.clone() }),
            status,
        })
    }
}

pub struct StubBankRails {
    pub response_code: Mutex<String>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl StubBankRails {
    pub fn new() -> Self {
        Self {
            response_code: Mutex::new("00".to_string()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_response_code(&self, code: &str) {
        *self.response_code.lock().unwrap() = code.to_string();
    }
}

#[async_trait]
impl BankRails for StubBankRails {
    async fn fund_transfer(
        &self,
        _request: FundTransferRequest,
    ) -> Result<FundTransferResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Upstream {
                status_code: 500,
                message: "rails unavailable".to_string(),
            });
        }
        Ok(FundTransferResponse {
            response_code: self.response_code.lock().unwrap().clone(),
            response_message: Some("stub".to_string()),
            transaction_reference: Some("FT-1".to_string()),
        })
    }
}

pub struct Harness {
    pub store: Arc<InMemoryTransactionStore>,
    pub ledger_store: Arc<InMemoryLedgerStore>,
    pub ledger: Arc<LedgerService>,
    pub provider: Arc<StubSettlementProvider>,
    pub rails: Arc<StubBankRails>,
    pub engine: Arc<ReconciliationEngine>,
    pub pollers: Arc<PollerRegistry>,
    pub exchange: Arc<ExchangeService>,
    pub bank_id: Uuid,
}

pub fn harness() -> Harness {
    harness_with_poller_config(PollerConfig::default())
}

pub fn harness_with_poller_config(poller_config: PollerConfig) -> Harness {
    let store = Arc::new(InMemoryTransactionStore::new());
    let ledger_store = Arc::new(InMemoryLedgerStore::new());
    let ledger = Arc::new(LedgerService::new(ledger_store.clone()));
    let provider = Arc::new(StubSettlementProvider::new());
    let rails = Arc::new(StubBankRails::new());

    let bank_id = Uuid::new_v4();
    let banks = Arc::new(StaticBankDirectory::new().with_bank(
        bank_id,
        BankDetails {
            bank_code: "058".to_string(),
            bank_name: "GTBank".to_string(),
            account_name: "Adaeze Okafor".to_string(),
            account_number: "0123456789".to_string(),
        },
    ));
    let rates = Arc::new(
        StaticRateTable::default().with_rate("USDT", BigDecimal::from(1500)),
    );

    let executor = Arc::new(SettlementExecutor::new(
        store.clone(),
        ledger.clone(),
        provider.clone(),
        rails.clone(),
        banks,
        FloatAccount {
            name: "Naira Bridge Float".to_string(),
            number: "9876543210".to_string(),
        },
    ));
    let engine = Arc::new(ReconciliationEngine::new(store.clone(), executor));
    let pollers = Arc::new(PollerRegistry::new(
        provider.clone(),
        engine.clone(),
        store.clone(),
        poller_config,
    ));
    let exchange = Arc::new(ExchangeService::new(
        store.clone(),
        provider.clone(),
        rates,
        pollers.clone(),
        "0.5".parse().unwrap(),
    ));

    Harness {
        store,
        ledger_store,
        ledger,
        provider,
        rails,
        engine,
        pollers,
        exchange,
        bank_id,
    }
}

pub fn test_config(webhook_strict: bool) -> Config {
    Config {
        server_port: 0,
        database_url: "postgres://localhost/test".to_string(),
        settlement_base_url: "https://api.settlement.example".to_string(),
        settlement_api_key: "sk_test".to_string(),
        rails_base_url: "https://rails.example".to_string(),
        rails_api_key: "rk_test".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        webhook_strict,
        margin_percent: "0.5".parse().unwrap(),
        poll_interval_secs: 15,
        poll_timeout_secs: 1800,
        float_account_name: "Naira Bridge Float".to_string(),
        float_account_number: "9876543210".to_string(),
        asset_rates: HashMap::new(),
    }
}

pub fn app_state(harness: &Harness, webhook_strict: bool) -> AppState {
    AppState {
        config: Arc::new(test_config(webhook_strict)),
        db: None,
        store: harness.store.clone(),
        ledger: harness.ledger.clone(),
        exchange: harness.exchange.clone(),
        engine: harness.engine.clone(),
        pollers: harness.pollers.clone(),
    }
}

/// 50 USDT sell at an effective 1485 NGN/USDT.
pub async fn insert_crypto_to_cash(harness: &Harness, transfer_id: &str) -> Transaction {
    let tx = Transaction::new(
        Uuid::new_v4(),
        Direction::CryptoToCash,
        "USDT".to_string(),
        Some("TRC20".to_string()),
        BigDecimal::from(50),
        BigDecimal::from(74250),
        "1485".parse().unwrap(),
        "qt_seed".to_string(),
        transfer_id.to_string(),
        None,
        Some(harness.bank_id),
    );
    harness.store.insert(&tx).await.unwrap()
}

/// 10,000 NGN buy at an effective 1507.5 NGN/USDT.
pub async fn insert_cash_to_crypto(harness: &Harness, transfer_id: &str) -> Transaction {
    let tx = Transaction::new(
        Uuid::new_v4(),
        Direction::CashToCrypto,
        "USDT".to_string(),
        Some("TRC20".to_string()),
        BigDecimal::from(10000),
        "6.63349917".parse().unwrap(),
        "1507.5".parse().unwrap(),
        "qt_seed".to_string(),
        transfer_id.to_string(),
        Some("TUserAddr42".to_string()),
        None,
    );
    harness.store.insert(&tx).await.unwrap()
}

pub fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
