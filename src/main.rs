use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;

use naira_bridge::cli::{Cli, Commands, DbCommands};
use naira_bridge::{adapters, build_state, cli, config, create_app, startup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli_args = Cli::parse();
    let config = config::Config::from_env()?;

    match cli_args.command {
        Some(Commands::Db(DbCommands::Migrate)) => {
            cli::handle_db_migrate(&config).await?;
            return Ok(());
        }
        Some(Commands::Config) => {
            cli::handle_config_validate(&config)?;
            return Ok(());
        }
        Some(Commands::Serve) | None => {}
    }

    // Database pool
    let pool = adapters::postgres::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let report = startup::validate_environment(&config, &pool).await?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("startup validation failed");
    }

    let server_port = config.server_port;
    let state = build_state(config, pool);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
