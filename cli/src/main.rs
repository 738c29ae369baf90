//! Lockbox command-line client
//!
//! Usage:
//!   lockbox put passwords bank hunter2
//!   lockbox get passwords bank
//!   lockbox sync --server https://vault.example.com --token <token>
//!   lockbox sync --watch 60

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lockbox_cli::commands;
use lockbox_cli::{ClientConfig, Overrides};
use lockbox_storage::VaultStore;
use lockbox_sync::{HttpRemoteStore, SyncCoordinator, SyncEngine};
use lockbox_types::EntityClass;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lockbox")]
#[command(version)]
#[command(about = "Personal secrets vault with server sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true, env = "LOCKBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the vault database
    #[arg(long, global = true, env = "LOCKBOX_DATABASE")]
    database: Option<PathBuf>,

    /// Sync server URL
    #[arg(long, global = true, env = "LOCKBOX_SERVER_URL")]
    server: Option<String>,

    /// Account token
    #[arg(long, global = true, env = "LOCKBOX_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a value
    Put {
        class: EntityClass,
        name: String,
        value: String,
    },
    /// Print a value
    Get { class: EntityClass, name: String },
    /// List entries of a class
    List { class: EntityClass },
    /// Remove an entry
    Remove { class: EntityClass, name: String },
    /// Sync with the server
    Sync {
        /// Only sync this class
        #[arg(long)]
        class: Option<EntityClass>,

        /// Keep syncing every N seconds until Ctrl-C
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Write the effective settings to the config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = ClientConfig::load(cli.config.as_deref())?.with_overrides(Overrides {
        database_path: cli.database,
        server_url: cli.server,
        token: cli.token,
    });
    debug!("Using vault at {}", config.database_path.display());

    if let Command::Init = cli.command {
        let path = cli.config.unwrap_or_else(ClientConfig::default_config_path);
        config.save(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let vault = VaultStore::open(&config.database_path)
        .with_context(|| format!("failed to open vault {}", config.database_path.display()))?;

    match cli.command {
        Command::Put { class, name, value } => {
            commands::put(&vault, class, &name, &value)?;
        }
        Command::Get { class, name } => match commands::get(&vault, class, &name)? {
            Some(value) => println!("{value}"),
            None => anyhow::bail!("{class}/{name} not found"),
        },
        Command::List { class } => {
            for line in commands::list(&vault, class)? {
                println!("{line}");
            }
        }
        Command::Remove { class, name } => {
            commands::remove(&vault, class, &name)?;
        }
        Command::Sync { class, watch } => {
            let remote = HttpRemoteStore::new(config.remote_config()?)?;
            remote
                .health()
                .await
                .context("sync server is not reachable")?;
            let coordinator = SyncCoordinator::new(
                Arc::new(vault),
                Arc::new(remote),
                SyncEngine::new(config.sync_config()),
            );
            let classes = commands::selected_classes(class);
            match watch {
                Some(secs) => {
                    commands::watch(&coordinator, &classes, Duration::from_secs(secs.max(1))).await
                }
                None => commands::sync_once(&coordinator, &classes).await?,
            }
        }
        Command::Init => {}
    }

    Ok(())
}
