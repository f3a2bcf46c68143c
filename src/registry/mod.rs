//! Token metadata directory, keyed by mint address.
//!
//! Backed by the community token-list JSON
//! (`{"tokens":[{"chainId":101,"address":"...","name":"...",...}]}`).

use std::{collections::HashMap, fs, path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub chain_id: u64,
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: u8,
}

#[derive(Debug, Deserialize)]
struct TokenList {
    tokens: Vec<TokenInfo>,
}

#[derive(Debug, Default, Clone)]
pub struct TokenRegistry {
    by_mint: HashMap<Pubkey, TokenInfo>,
}

impl TokenRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Later entries for the same mint replace earlier ones.
    pub fn from_tokens<I>(tokens: I, chain_id: Option<u64>) -> Self
    where
        I: IntoIterator<Item = TokenInfo>,
    {
        let mut by_mint = HashMap::new();
        for token in tokens {
            if chain_id.is_some_and(|id| id != token.chain_id) {
                continue;
            }
            match Pubkey::from_str(&token.address) {
                Ok(mint) => {
                    by_mint.insert(mint, token);
                }
                Err(_) => warn!("⚠️ [REGISTRY] Ignoring bad mint address `{}`", token.address),
            }
        }
        Self { by_mint }
    }

    pub fn from_json_str(raw: &str, chain_id: Option<u64>) -> Result<Self> {
        let list: TokenList = serde_json::from_str(raw).context("parsing token list")?;
        Ok(Self::from_tokens(list.tokens, chain_id))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P, chain_id: Option<u64>) -> Result<Self> {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading token list {:?}", path.as_ref()))?;
        let registry = Self::from_json_str(&raw, chain_id)?;
        info!(
            "📚 [REGISTRY] Loaded {} tokens from {:?}",
            registry.len(),
            path.as_ref()
        );
        Ok(registry)
    }

    pub async fn fetch(url: &str, chain_id: Option<u64>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building http client")?;

        let res = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching token list {url}"))?
            .error_for_status()
            .with_context(|| format!("token list {url}"))?;
        let raw = res.text().await.context("reading token list body")?;

        let registry = Self::from_json_str(&raw, chain_id)?;
        info!("📚 [REGISTRY] Loaded {} tokens from {}", registry.len(), url);
        Ok(registry)
    }

    pub fn name(&self, mint: &Pubkey) -> Option<&str> {
        self.by_mint.get(mint).map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_mint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mint.is_empty()
    }
}
