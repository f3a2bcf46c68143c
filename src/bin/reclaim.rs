//! Find zero-balance token accounts and close them to reclaim rent.
//!
//! Usage:
//!   cargo run --bin reclaim -- list [--owner <PUBKEY>]
//!   cargo run --bin reclaim -- close <ACCOUNT>...
//!   cargo run --bin reclaim -- close-all [--dry-run]

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use account_reclaimer::{
    config::settings::{Settings, DEFAULT_SETTINGS_PATH},
    ledger::{Ledger, RpcLedger},
    registry::TokenRegistry,
    render,
    session::{ReclaimSession, SessionOptions},
    tx::plan_batches,
    wallet::{KeypairWallet, WalletProvider, WatchOnlyWallet},
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use solana_sdk::pubkey::Pubkey;

#[derive(Parser)]
#[command(name = "reclaim", version, about = "Close empty SPL token accounts and reclaim their rent")]
struct Cli {
    /// Settings file; defaults are used when the default path is absent
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List zero-balance token accounts
    List {
        /// Inspect this address instead of the configured wallet
        #[arg(long)]
        owner: Option<String>,
    },
    /// Close the given token accounts
    Close {
        #[arg(required = true)]
        accounts: Vec<String>,
    },
    /// Close every closable zero-balance account
    CloseAll {
        /// Print the transaction plan without signing anything
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() && path == Path::new(DEFAULT_SETTINGS_PATH) {
        info!("⚙️ [CONFIG] {} not found, using defaults", DEFAULT_SETTINGS_PATH);
        return Settings::from_json(&serde_json::json!({}));
    }
    Settings::load_from_file(path)
}

async fn load_registry(settings: &Settings) -> TokenRegistry {
    let loaded = match &settings.token_list_path {
        Some(path) => TokenRegistry::load_from_file(path, settings.token_list_chain_id),
        None => TokenRegistry::fetch(&settings.token_list_url, settings.token_list_chain_id).await,
    };
    loaded.unwrap_or_else(|e| {
        warn!("⚠️ [REGISTRY] Token names unavailable: {:#}", e);
        TokenRegistry::empty()
    })
}

fn parse_pubkey(raw: &str) -> Result<Pubkey> {
    Pubkey::from_str(raw).map_err(|e| anyhow!("invalid address `{raw}`: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = load_settings(&cli.settings)?;
    let explorer = settings.explorer_url.clone();

    let wallet: Arc<dyn WalletProvider> = match &cli.command {
        Command::List { owner: Some(owner) } => Arc::new(WatchOnlyWallet::new(parse_pubkey(owner)?)),
        _ => Arc::new(KeypairWallet::new(
            settings.load_keypair().context("loading signing wallet")?,
        )),
    };
    let ledger: Arc<dyn Ledger> = Arc::new(RpcLedger::new(settings.rpc_client.clone()));
    let registry = Arc::new(load_registry(&settings).await);

    let session = ReclaimSession::new(
        ledger,
        wallet,
        registry,
        SessionOptions::from_settings(&settings),
    );

    let accounts = session.refresh().await?;
    let owner = session
        .owner()
        .ok_or_else(|| anyhow!("wallet disconnected during discovery"))?;
    print!("{}", render::connected(&explorer, &owner));
    println!();

    match cli.command {
        Command::List { .. } => {
            print!("{}", render::listing(&explorer, &accounts));
        }
        Command::Close { accounts: raw } => {
            let targets = raw
                .iter()
                .map(|a| parse_pubkey(a))
                .collect::<Result<Vec<_>>>()?;
            let report = session.close_accounts(&targets).await?;
            print!("{}", render::report(&explorer, &report));
            println!();
            print!("{}", render::listing(&explorer, &session.empty_accounts()));
            if !report.is_success() {
                bail!("{} transaction(s) failed", report.failed_batches());
            }
        }
        Command::CloseAll { dry_run: true } => {
            let closable: Vec<_> = accounts.into_iter().filter(|a| a.is_closable()).collect();
            if closable.is_empty() {
                println!("Nothing to close");
            } else {
                print!(
                    "{}",
                    render::plan(&plan_batches(&closable, settings.max_closes_per_tx))
                );
            }
        }
        Command::CloseAll { dry_run: false } => {
            let report = session.close_all().await?;
            print!("{}", render::report(&explorer, &report));
            println!();
            print!("{}", render::listing(&explorer, &session.empty_accounts()));
            if !report.is_success() {
                bail!("{} transaction(s) failed", report.failed_batches());
            }
        }
    }

    Ok(())
}
