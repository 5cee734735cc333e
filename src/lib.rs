pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod providers;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::adapters::memory::StaticRateTable;
use crate::adapters::postgres::{
    PostgresBankDirectory, PostgresLedgerStore, PostgresTransactionStore,
};
use crate::config::Config;
use crate::ports::TransactionStore;
use crate::providers::{HttpBankRailsClient, HttpSettlementClient, SettlementProvider};
use crate::services::{
    ExchangeService, FloatAccount, LedgerService, PollerConfig, PollerRegistry,
    ReconciliationEngine, SettlementExecutor,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Present when backed by Postgres; reported by /health.
    pub db: Option<sqlx::PgPool>,
    pub store: Arc<dyn TransactionStore>,
    pub ledger: Arc<LedgerService>,
    pub exchange: Arc<ExchangeService>,
    pub engine: Arc<ReconciliationEngine>,
    pub pollers: Arc<PollerRegistry>,
}

/// Wires the production object graph: Postgres stores, HTTP provider
/// clients, and the service layer on top.
pub fn build_state(config: Config, pool: sqlx::PgPool) -> AppState {
    let store: Arc<dyn TransactionStore> =
        Arc::new(PostgresTransactionStore::new(pool.clone()));
    let ledger = Arc::new(LedgerService::new(Arc::new(PostgresLedgerStore::new(
        pool.clone(),
    ))));
    let banks = Arc::new(PostgresBankDirectory::new(pool.clone()));
    let rates = Arc::new(StaticRateTable::new(config.asset_rates.clone()));

    let provider: Arc<dyn SettlementProvider> = Arc::new(HttpSettlementClient::new(
        config.settlement_base_url.clone(),
        config.settlement_api_key.clone(),
    ));
    let rails = Arc::new(HttpBankRailsClient::new(
        config.rails_base_url.clone(),
        config.rails_api_key.clone(),
    ));

    let executor = Arc::new(SettlementExecutor::new(
        store.clone(),
        ledger.clone(),
        provider.clone(),
        rails,
        banks,
        FloatAccount {
            name: config.float_account_name.clone(),
            number: config.float_account_number.clone(),
        },
    ));
    let engine = Arc::new(ReconciliationEngine::new(store.clone(), executor));
    let pollers = Arc::new(PollerRegistry::new(
        provider.clone(),
        engine.clone(),
        store.clone(),
        PollerConfig {
            interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.poll_timeout_secs),
        },
    ));
    let exchange = Arc::new(ExchangeService::new(
        store.clone(),
        provider,
        rates,
        pollers.clone(),
        config.margin_percent.clone(),
    ));

    AppState {
        config: Arc::new(config),
        db: Some(pool),
        store,
        ledger,
        exchange,
        engine,
        pollers,
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route(
            "/transactions/:id",
            get(handlers::transactions::get_transaction),
        )
        .route(
            "/webhooks/settlement",
            post(handlers::webhook::settlement_webhook),
        )
        .route("/ledger/entries", get(handlers::ledger::list_entries))
        .route(
            "/ledger/balance/:owner_id",
            get(handlers::ledger::get_balance),
        )
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
