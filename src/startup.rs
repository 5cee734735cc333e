use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub settlement_provider: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.settlement_provider
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables:   {}", status(self.environment));
        println!("Database Connectivity:   {}", status(self.database));
        println!("Settlement Provider:     {}", status(self.settlement_provider));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        settlement_provider: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    if let Err(e) = validate_settlement_provider(&config.settlement_base_url).await {
        report.settlement_provider = false;
        report.errors.push(format!("Settlement provider: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.webhook_secret.is_empty() {
        anyhow::bail!("WEBHOOK_SECRET is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.float_account_number.is_empty() {
        anyhow::bail!("FLOAT_ACCOUNT_NUMBER is empty");
    }

    url::Url::parse(&config.settlement_base_url)
        .context("SETTLEMENT_BASE_URL is not a valid URL")?;
    url::Url::parse(&config.rails_base_url).context("RAILS_BASE_URL is not a valid URL")?;

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_settlement_provider(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    // Any HTTP answer counts as reachable; the API root may well 401 an
    // unauthenticated probe.
    let response = client
        .get(base_url)
        .send()
        .await
        .context("Failed to connect to settlement provider")?;

    if response.status().is_server_error() {
        anyhow::bail!("Settlement provider returned status: {}", response.status());
    }

    Ok(())
}
