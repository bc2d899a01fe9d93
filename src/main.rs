//! Presale Admin Backend
//!
//! Run modes:
//!   cargo run                    - Show usage
//!   cargo run -- api             - Start REST API (for the dashboard)
//!   cargo run -- provision       - Create the whitelist table and wait until it is active
//!   cargo run -- seed            - Write the demo entries into the whitelist table

use presale_admin::api::{self, AppState, SharedAppState};
use presale_admin::common::{init_from_config, PresaleConfig, PresaleError, Result};
use presale_admin::whitelist::FallbackData;
use std::env;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "api" => run_api_server(&args[2..]).await,
        "provision" => run_provision().await,
        "seed" => run_seed().await,
        "help" | "--help" | "-h" => print_usage(),
        _ => print_usage(),
    }
}

fn print_usage() {
    println!("Presale Admin Backend");
    println!();
    println!("Usage:");
    println!("  presale-admin api [--port <port>]   Start REST API server (default: 3001)");
    println!("  presale-admin provision             Create the whitelist table if missing");
    println!("  presale-admin seed                  Write demo entries into the whitelist table");
    println!();
    println!("Environment Variables:");
    println!("  PRESALE_ENV                  production | staging | development (default: development)");
    println!("  PRESALE_API_PORT             REST API port (default: 3001)");
    println!("  PRESALE_STORE                sqlite | memory (default: sqlite)");
    println!("  PRESALE_DB_PATH              SQLite file (default: data/presale.db)");
    println!("  PRESALE_WHITELIST_TABLE      Whitelist table name (default: presale-whitelist)");
    println!("  PRESALE_ON_STORE_ERROR       fallback | propagate (default: fallback)");
    println!("  PRESALE_TABLE_POLL_MS        Table readiness poll interval (default: 500)");
    println!("  PRESALE_TABLE_POLL_ATTEMPTS  Table readiness polls (default: 20)");
    println!("  PRESALE_LOG_LEVEL            trace | debug | info | warn | error (default: info)");
}

/// Load configuration, initialize logging and open the store
fn bootstrap() -> Result<(PresaleConfig, SharedAppState)> {
    let config = PresaleConfig::from_env()?;

    if let Err(e) = init_from_config(&config) {
        eprintln!("Warning: {}", e);
    }

    config.validate_for_production()?;
    config.log_summary();

    let state = AppState::from_config(&config)?;
    Ok((config, state))
}

/// Bootstrap or exit; nothing can run without configuration and a store
fn bootstrap_or_exit() -> (PresaleConfig, SharedAppState) {
    bootstrap().unwrap_or_else(|e| fail("startup failed", e))
}

fn fail(context: &str, e: PresaleError) -> ! {
    error!(code = e.error_code(), error = %e, "{}", context);
    eprintln!("{}: {}", context, e);
    process::exit(1);
}

/// Start REST API server
async fn run_api_server(args: &[String]) {
    let (config, state) = bootstrap_or_exit();
    let mut port = config.api_port;

    // Parse arguments
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                port = args[i + 1].parse().unwrap_or(config.api_port);
                i += 2;
            }
            _ => i += 1,
        }
    }

    if let Err(e) = api::start_server(state, port).await {
        fail("API server error", e.into());
    }
}

async fn run_provision() {
    let (_, state) = bootstrap_or_exit();

    match state.whitelist.ensure_table().await {
        Ok(()) => info!(table = %state.whitelist.table(), "whitelist table is active"),
        Err(e) => fail("provisioning failed", e.into()),
    }
}

async fn run_seed() {
    let (_, state) = bootstrap_or_exit();

    if let Err(e) = state.whitelist.ensure_table().await {
        fail("provisioning failed", e.into());
    }

    match state.whitelist.seed(&FallbackData::demo().entries()).await {
        Ok(count) => info!(table = %state.whitelist.table(), count, "seeded whitelist"),
        Err(e) => fail("seeding failed", e.into()),
    }
}
