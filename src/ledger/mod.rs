//! Ledger access used by discovery and the close flow.

pub mod parse;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_request::TokenAccountsFilter};
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};

pub use parse::{TokenAccountRecord, TokenAccountState, TokenAmount};

/// Where a submitted transaction stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Unknown to the node yet, or below the requested commitment.
    Pending,
    Confirmed,
    /// Landed but the runtime rejected it.
    Failed(String),
}

#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Every token account owned by `owner` under `program_id`.
    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<TokenAccountRecord>>;

    async fn latest_blockhash(&self) -> Result<Hash>;

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature>;

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus>;
}

/// JSON-RPC node access.
#[derive(Clone)]
pub struct RpcLedger {
    client: Arc<RpcClient>,
}

impl RpcLedger {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<TokenAccountRecord>> {
        let keyed = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(*program_id))
            .await
            .with_context(|| format!("getTokenAccountsByOwner {owner} / {program_id}"))?;

        debug!(
            "📡 [LEDGER] {} accounts under {} for {}",
            keyed.len(),
            program_id,
            owner
        );

        let mut records = Vec::with_capacity(keyed.len());
        for account in keyed {
            let pubkey = account.pubkey.clone();
            match parse::decode_keyed_account(account, program_id) {
                Ok(record) => records.push(record),
                Err(e) => warn!("⚠️ [LEDGER] Skipping undecodable account {}: {:#}", pubkey, e),
            }
        }
        Ok(records)
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        self.client
            .get_latest_blockhash()
            .await
            .context("getLatestBlockhash")
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature> {
        self.client
            .send_transaction(tx)
            .await
            .context("sendTransaction")
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus> {
        let statuses = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .with_context(|| format!("getSignatureStatuses {signature}"))?
            .value;

        Ok(match statuses.into_iter().next().flatten() {
            Some(status) => match status.err {
                Some(err) => SignatureStatus::Failed(err.to_string()),
                None if status.satisfies_commitment(self.client.commitment()) => {
                    SignatureStatus::Confirmed
                }
                None => SignatureStatus::Pending,
            },
            None => SignatureStatus::Pending,
        })
    }
}
