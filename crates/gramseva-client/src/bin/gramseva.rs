//! GramSeva developer console
//!
//! ## Usage
//!
//! ```bash
//! gramseva health
//! gramseva dump bills
//! gramseva watch
//! gramseva login --email admin.gas@gramseva.gov.in --password admin123 --role officer --department Gas
//! gramseva --server http://10.0.0.5:3001 --profile field-office dump requests
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gramseva_client::constants::{DEFAULT_PROFILE, DEFAULT_SERVER_URL};
use gramseva_client::{
    ClientConfig, ConnectionStatus, HttpRemote, LocalStore, RealtimeClient, Remote, ServerEvent,
    SessionResolver,
};
use gramseva_types::{Collection, Department, Role};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gramseva", version, about = "GramSeva developer console")]
struct Cli {
    /// Server base URL
    #[arg(long, env = "GRAMSEVA_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Local profile name; selects the local cache directory
    #[arg(long, env = "GRAMSEVA_PROFILE", default_value = DEFAULT_PROFILE)]
    profile: String,

    /// Local cache directory (overrides --profile)
    #[arg(long, env = "GRAMSEVA_CLIENT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server answers
    Health,
    /// Print a collection as JSON
    Dump {
        /// accounts, requests, bills, transactions, notices, notifications, businesses
        collection: Collection,
    },
    /// Print realtime events until interrupted
    Watch,
    /// Sign in and store the session for this profile
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "GRAMSEVA_PASSWORD")]
        password: String,
        #[arg(long, default_value = "developer")]
        role: Role,
        #[arg(long)]
        department: Option<Department>,
    },
    /// Forget the stored session for this profile
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.data_dir {
        Some(dir) => ClientConfig::new(&cli.server, dir),
        None => ClientConfig::for_profile(&cli.server, &cli.profile),
    };
    let remote = HttpRemote::new(&config)?;

    match cli.command {
        Command::Health => {
            remote.health().await.context("server health check failed")?;
            println!("ok");
        }
        Command::Dump { collection } => {
            let value = match remote.fetch(collection).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "server unreachable; showing local cache");
                    LocalStore::open(&config.data_dir)?.load(collection)
                }
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Watch => watch_events(&config).await,
        Command::Login {
            email,
            password,
            role,
            department,
        } => {
            let session = SessionResolver::new(Arc::new(remote), LocalStore::open(&config.data_dir)?);
            let account = session.login(&email, &password, role, department).await?;
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        Command::Logout => {
            let session = SessionResolver::new(Arc::new(remote), LocalStore::open(&config.data_dir)?);
            session.logout()?;
            println!("signed out");
        }
    }
    Ok(())
}

async fn watch_events(config: &ClientConfig) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (status_tx, mut status_rx) = watch::channel(ConnectionStatus::Disconnected);
    let cancel = CancellationToken::new();
    let listener = RealtimeClient::new(config).spawn(tx, status_tx, cancel.clone());
    info!(url = %config.ws_url(), "watching realtime events; Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                println!("-- {status:?}");
            }
            event = rx.recv() => match event {
                Some(ServerEvent::Connected) => {}
                Some(ServerEvent::CollectionUpdated { collection, payload }) => {
                    let count = payload.as_array().map_or(0, Vec::len);
                    println!("{} ({count} records)", collection.event_name());
                }
                None => break,
            },
        }
    }

    cancel.cancel();
    let _ = listener.await;
}
