//! Lockbox sync server
//!
//! Stores each account's vault entries and serves them to sync clients.
//!
//! Usage:
//!   lockbox-server add-account alice --database lockbox-server.db
//!   lockbox-server serve --addr 0.0.0.0:8080 --database lockbox-server.db
//!
//! Entry data arrives already encrypted; the server never sees plaintext.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lockbox_server::{AppState, build_router};
use lockbox_storage::ServerStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lockbox-server")]
#[command(about = "Lockbox vault sync server")]
struct Args {
    /// Path to the server database
    #[arg(short, long, global = true, default_value = "lockbox-server.db", env = "LOCKBOX_SERVER_DB")]
    database: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
    /// Create an account and print its bearer token
    AddAccount {
        /// Account name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let store = ServerStore::open(&args.database)
        .with_context(|| format!("failed to open database {}", args.database.display()))?;

    match args.command {
        Command::AddAccount { name } => {
            let (id, token) = store
                .create_account(&name)
                .with_context(|| format!("failed to create account '{name}'"))?;
            info!("Account '{}' has id {}", name, id);
            // The token is only shown once.
            println!("{token}");
        }
        Command::Serve { addr } => {
            let app = build_router(AppState::new(store));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!("Lockbox server listening on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
            info!("Lockbox server stopped");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
