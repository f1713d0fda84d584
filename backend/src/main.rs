//! Food Supply Chain Ledger - command line entry point
//!
//! Tracks stock lots from supplier intake through workstations, packaging
//! and delivery to restaurants, and consumes or restores restaurant stock as
//! orders move through their lifecycle.

use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;
mod error;
mod models;
mod services;
mod store;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::AppResult;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => exit_with(err.into()),
    };
    init_tracing(&config);
    tracing::debug!(environment = %config.environment, "Configuration loaded");

    match run(cli, &config).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => exit_with(err),
    }
}

async fn run(cli: Cli, config: &Config) -> AppResult<serde_json::Value> {
    let db = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;
    tracing::debug!("Database connection established");

    cli::dispatch(cli.command, db, config).await
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command results only
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn exit_with(err: error::AppError) -> ! {
    tracing::error!(code = err.code(), error = %err, "Command failed");
    match serde_json::to_string_pretty(&err.to_response()) {
        Ok(body) => println!("{}", body),
        Err(_) => eprintln!("{}", err),
    }
    std::process::exit(err.exit_code())
}
