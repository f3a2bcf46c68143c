//! Runtime configuration loader.

use std::{fmt, fs, path::Path, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    signature::{read_keypair_file, Keypair},
};
use url::Url;

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_TOKEN_LIST_URL: &str =
    "https://cdn.jsdelivr.net/gh/solana-labs/token-list@main/src/tokens/solana.tokenlist.json";
pub const DEFAULT_EXPLORER_URL: &str = "https://solscan.io";
pub const MAINNET_CHAIN_ID: u64 = 101;

/// ------------------------------------------------------------------
/// Wallet file entries (same layout as the trading bots' wallets.json)
/// ------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct WalletKeypairEntry {
    pub name: String,
    pub address: String,
    pub private_key_base58: String,
}

/// ------------------------------------------------------------------
/// Serializable Settings (written back by `save_to_file`)
/// ------------------------------------------------------------------
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableSettings {
    pub rpc_url: String,
    pub commitment: String,
    pub token_list_url: String,
    pub token_list_path: Option<PathBuf>,
    pub token_list_chain_id: Option<u64>,
    pub wallets_file: String,
    pub active_wallet: String,
    pub keypair_path: Option<PathBuf>,
    pub include_token_2022: bool,
    pub max_closes_per_tx: usize,
    pub priority_fee_sol: f64,
    pub confirm_timeout_ms: u64,
    pub confirm_poll_ms: u64,
    pub settle_delay_ms: u64,
    pub explorer_url: String,
}

/// ------------------------------------------------------------------
/// Main Settings object
/// ------------------------------------------------------------------
pub struct Settings {
    /* -------- ledger -------------------------------- */
    pub rpc_url: String,
    pub commitment: CommitmentConfig,

    /* -------- token directory ----------------------- */
    pub token_list_url: String,
    pub token_list_path: Option<PathBuf>,
    pub token_list_chain_id: Option<u64>,

    /* -------- signing wallet ------------------------ */
    pub wallets_file: String,
    pub active_wallet: String,
    pub keypair_path: Option<PathBuf>,

    /* -------- close tuning -------------------------- */
    pub include_token_2022: bool,
    pub max_closes_per_tx: usize,
    pub priority_fee_sol: f64,
    pub confirm_timeout_ms: u64,
    pub confirm_poll_ms: u64,
    pub settle_delay_ms: u64,

    /* -------- presentation -------------------------- */
    pub explorer_url: String,

    /* -------- shared objects ------------------------ */
    pub rpc_client: Arc<RpcClient>,
}

impl Settings {
    /// --------------------------------------------------------------
    /// Read `settings.json` from disk.
    /// --------------------------------------------------------------
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading settings file {:?}", path.as_ref()))?;
        let json: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings file {:?}", path.as_ref()))?;
        Self::from_json(&json)
    }

    /// --------------------------------------------------------------
    /// Load settings from the default config/settings.json file.
    /// --------------------------------------------------------------
    pub fn load() -> Result<Self> {
        Self::load_from_file(DEFAULT_SETTINGS_PATH)
    }

    /// Build settings from an already parsed JSON document, applying
    /// defaults for every missing field.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        /* -------- plain strings ---------------------------------- */
        let rpc_url = json["rpc_url"]
            .as_str()
            .unwrap_or(DEFAULT_RPC_URL)
            .to_string();
        Url::parse(&rpc_url).with_context(|| format!("invalid rpc_url `{rpc_url}`"))?;

        let commitment_raw = json["commitment"].as_str().unwrap_or("confirmed");
        let commitment = CommitmentConfig::from_str(commitment_raw)
            .map_err(|_| anyhow!("invalid commitment `{commitment_raw}`"))?;

        let token_list_url = json["token_list_url"]
            .as_str()
            .unwrap_or(DEFAULT_TOKEN_LIST_URL)
            .to_string();
        let token_list_path = json["token_list_path"].as_str().map(PathBuf::from);
        // `null` disables the filter, a missing key keeps mainnet-beta.
        let token_list_chain_id = match json.get("token_list_chain_id") {
            Some(serde_json::Value::Null) => None,
            Some(v) => Some(
                v.as_u64()
                    .ok_or_else(|| anyhow!("token_list_chain_id must be an integer"))?,
            ),
            None => Some(MAINNET_CHAIN_ID),
        };

        let wallets_file = json["wallets_file"]
            .as_str()
            .unwrap_or("./wallets.json")
            .to_string();
        let active_wallet = json["active_wallet"]
            .as_str()
            .unwrap_or("Main")
            .to_string();
        let keypair_path = json["keypair_path"].as_str().map(PathBuf::from);

        let explorer_url = json["explorer_url"]
            .as_str()
            .unwrap_or(DEFAULT_EXPLORER_URL)
            .trim_end_matches('/')
            .to_string();
        Url::parse(&explorer_url)
            .with_context(|| format!("invalid explorer_url `{explorer_url}`"))?;

        /* -------- numeric parameters ----------------------------- */
        let include_token_2022 = json["include_token_2022"].as_bool().unwrap_or(true);
        let max_closes_per_tx = json["max_closes_per_tx"].as_u64().unwrap_or(20) as usize;
        if max_closes_per_tx == 0 {
            return Err(anyhow!("max_closes_per_tx must be at least 1"));
        }
        let priority_fee_sol = json["priority_fee_sol"].as_f64().unwrap_or(0.0);
        if priority_fee_sol < 0.0 {
            return Err(anyhow!("priority_fee_sol must not be negative"));
        }
        let confirm_timeout_ms = json["confirm_timeout_ms"].as_u64().unwrap_or(60_000);
        let confirm_poll_ms = json["confirm_poll_ms"].as_u64().unwrap_or(500);
        let settle_delay_ms = json["settle_delay_ms"].as_u64().unwrap_or(4_000);

        /* -------- misc ------------------------------------------- */
        let rpc_client = Arc::new(RpcClient::new_with_commitment(rpc_url.clone(), commitment));

        Ok(Self {
            rpc_url,
            commitment,
            token_list_url,
            token_list_path,
            token_list_chain_id,
            wallets_file,
            active_wallet,
            keypair_path,
            include_token_2022,
            max_closes_per_tx,
            priority_fee_sol,
            confirm_timeout_ms,
            confirm_poll_ms,
            settle_delay_ms,
            explorer_url,
            rpc_client,
        })
    }

    /// --------------------------------------------------------------
    /// Resolve the signing keypair.
    ///
    /// `keypair_path` (a Solana CLI keypair file) wins; otherwise the
    /// `active_wallet` entry of `wallets_file` is decoded from base58.
    /// --------------------------------------------------------------
    pub fn load_keypair(&self) -> Result<Keypair> {
        if let Some(path) = &self.keypair_path {
            return read_keypair_file(path)
                .map_err(|e| anyhow!("reading keypair file {:?}: {e}", path));
        }

        let wallet_map_raw = fs::read_to_string(&self.wallets_file)
            .with_context(|| format!("reading wallets file {}", self.wallets_file))?;
        let wallet_list: Vec<WalletKeypairEntry> =
            serde_json::from_str(&wallet_map_raw).context("parsing wallets file")?;

        let active_wallet = &self.active_wallet;
        let entry = wallet_list
            .iter()
            .find(|w| &w.name == active_wallet)
            .ok_or_else(|| anyhow!("active wallet `{active_wallet}` not found"))?;

        let private_key_bytes = bs58::decode(&entry.private_key_base58)
            .into_vec()
            .context("decoding base58 key")?;
        let keypair = Keypair::from_bytes(&private_key_bytes)
            .map_err(|e| anyhow!("invalid keypair bytes for `{}`: {e}", entry.name))?;

        Ok(keypair)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// --------------------------------------------------------------
    /// Save settings to a specific file path.
    /// --------------------------------------------------------------
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_string = serde_json::to_string_pretty(&self.to_serializable())?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&path, json_string)
            .with_context(|| format!("writing settings to {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn to_serializable(&self) -> SerializableSettings {
        SerializableSettings {
            rpc_url: self.rpc_url.clone(),
            commitment: self.commitment.commitment.to_string(),
            token_list_url: self.token_list_url.clone(),
            token_list_path: self.token_list_path.clone(),
            token_list_chain_id: self.token_list_chain_id,
            wallets_file: self.wallets_file.clone(),
            active_wallet: self.active_wallet.clone(),
            keypair_path: self.keypair_path.clone(),
            include_token_2022: self.include_token_2022,
            max_closes_per_tx: self.max_closes_per_tx,
            priority_fee_sol: self.priority_fee_sol,
            confirm_timeout_ms: self.confirm_timeout_ms,
            confirm_poll_ms: self.confirm_poll_ms,
            settle_delay_ms: self.settle_delay_ms,
            explorer_url: self.explorer_url.clone(),
        }
    }
}

/* ------------------------------------------------------------------ */
/*  Manual Clone & Debug implementations (RpcClient isn’t Clone/Debug) */
/* ------------------------------------------------------------------ */
impl Clone for Settings {
    fn clone(&self) -> Self {
        Self {
            rpc_url: self.rpc_url.clone(),
            commitment: self.commitment,
            token_list_url: self.token_list_url.clone(),
            token_list_path: self.token_list_path.clone(),
            token_list_chain_id: self.token_list_chain_id,
            wallets_file: self.wallets_file.clone(),
            active_wallet: self.active_wallet.clone(),
            keypair_path: self.keypair_path.clone(),
            include_token_2022: self.include_token_2022,
            max_closes_per_tx: self.max_closes_per_tx,
            priority_fee_sol: self.priority_fee_sol,
            confirm_timeout_ms: self.confirm_timeout_ms,
            confirm_poll_ms: self.confirm_poll_ms,
            settle_delay_ms: self.settle_delay_ms,
            explorer_url: self.explorer_url.clone(),
            rpc_client: Arc::clone(&self.rpc_client),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url)
            .field("commitment", &self.commitment.commitment)
            .field("active_wallet", &self.active_wallet)
            .field("include_token_2022", &self.include_token_2022)
            .field("max_closes_per_tx", &self.max_closes_per_tx)
            .finish_non_exhaustive()
    }
}
