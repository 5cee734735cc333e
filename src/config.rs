use anyhow::Context;
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub settlement_base_url: String,
    pub settlement_api_key: String,
    pub rails_base_url: String,
    pub rails_api_key: String,
    pub webhook_secret: String,
    /// Lenient mode (default) acknowledges webhooks for unknown transfers to
    /// avoid provider retry storms; strict mode returns 404.
    pub webhook_strict: bool,
    pub margin_percent: BigDecimal,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub float_account_name: String,
    pub float_account_number: String,
    /// Asset -> NGN rates, e.g. "USDT=1500,BTC=98000000".
    pub asset_rates: HashMap<String, BigDecimal>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            settlement_base_url: env::var("SETTLEMENT_BASE_URL")?,
            settlement_api_key: env::var("SETTLEMENT_API_KEY")?,
            rails_base_url: env::var("RAILS_BASE_URL")?,
            rails_api_key: env::var("RAILS_API_KEY")?,
            webhook_secret: env::var("WEBHOOK_SECRET")?,
            webhook_strict: env::var("WEBHOOK_STRICT")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            margin_percent: env::var("EXCHANGE_MARGIN_PERCENT")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()
                .context("EXCHANGE_MARGIN_PERCENT is not a decimal")?,
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()?,
            poll_timeout_secs: env::var("POLL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()?,
            float_account_name: env::var("FLOAT_ACCOUNT_NAME")?,
            float_account_number: env::var("FLOAT_ACCOUNT_NUMBER")?,
            asset_rates: parse_rates(&env::var("ASSET_NGN_RATES").unwrap_or_default())?,
        })
    }
}

fn parse_rates(raw: &str) -> anyhow::Result<HashMap<String, BigDecimal>> {
    let mut rates = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (asset, rate) = pair
            .split_once('=')
            .with_context(|| format!("bad rate entry '{}', expected ASSET=RATE", pair))?;
        let rate: BigDecimal = rate
            .trim()
            .parse()
            .with_context(|| format!("rate for {} is not a decimal", asset))?;
        rates.insert(asset.trim().to_uppercase(), rate);
    }
    Ok(rates)
}
