pub mod api;
pub mod clients;
pub mod config;
pub mod crypto;
pub mod db;
pub mod entities;
pub mod services;
pub mod state;
pub mod uom;

use std::sync::Arc;
use tokio::signal;

pub use config::Config;
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "daemon" | "serve" | "-d" | "--daemon" => run_daemon(config).await,

        "maintenance" => {
            if args.len() < 3 {
                println!("Usage: opname maintenance <task>");
                println!("Tasks: purge-sessions");
                return Ok(());
            }
            match args[2].as_str() {
                "purge-sessions" => run_purge_sessions(config).await,
                _ => {
                    println!("Unknown maintenance task: {}", args[2]);
                    println!("Use: purge-sessions");
                    Ok(())
                }
            }
        }

        "init" | "--init" => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            println!("Unknown command: {}", args[1]);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Opname - Warehouse Inventory Scanning & Reconciliation");
    println!("A thin service in front of an Odoo ERP");
    println!();
    println!("USAGE:");
    println!("  opname <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("  daemon            Run the web API server");
    println!("  maintenance purge-sessions");
    println!("                    Retire expired ERP sessions and delete inactive ones.");
    println!("                    Intended to be invoked by an external scheduler (cron).");
    println!("  init              Create default config file");
    println!("  help              Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  opname daemon                        # Start the API server");
    println!("  opname maintenance purge-sessions    # One maintenance sweep, then exit");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure the ERP connection, database, etc.");
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        "Opname v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let port = config.server.port;
    let shared = Arc::new(SharedState::new(config).await?);
    let state = api::create_app_state(shared);

    let app = api::router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("Web API running at http://0.0.0.0:{}", port);
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    server_handle.abort();
    info!("Daemon stopped");

    Ok(())
}

async fn run_purge_sessions(config: Config) -> anyhow::Result<()> {
    let shared = SharedState::new(config).await?;
    let report = shared.erp_sessions.run_maintenance().await?;

    println!(
        "Maintenance complete: {} session(s) expired, {} purged.",
        report.expired, report.purged
    );

    Ok(())
}
