//! Signing provider behind the close flow.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use solana_sdk::{
    message::VersionedMessage,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};

#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Currently connected address, `None` while disconnected.
    fn address(&self) -> Option<Pubkey>;

    async fn sign_transaction(&self, message: VersionedMessage) -> Result<VersionedTransaction>;

    /// Sign a whole batch. Either every message is signed or none is.
    async fn sign_all_transactions(
        &self,
        messages: Vec<VersionedMessage>,
    ) -> Result<Vec<VersionedTransaction>> {
        let mut signed = Vec::with_capacity(messages.len());
        for message in messages {
            signed.push(self.sign_transaction(message).await?);
        }
        Ok(signed)
    }
}

/// Local keypair; signs without prompting.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

#[async_trait]
impl WalletProvider for KeypairWallet {
    fn address(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn sign_transaction(&self, message: VersionedMessage) -> Result<VersionedTransaction> {
        Ok(VersionedTransaction::try_new(message, &[&self.keypair])?)
    }
}

/// Address-only wallet for read-only listings.
pub struct WatchOnlyWallet {
    address: Pubkey,
}

impl WatchOnlyWallet {
    pub fn new(address: Pubkey) -> Self {
        Self { address }
    }
}

#[async_trait]
impl WalletProvider for WatchOnlyWallet {
    fn address(&self) -> Option<Pubkey> {
        Some(self.address)
    }

    async fn sign_transaction(&self, _message: VersionedMessage) -> Result<VersionedTransaction> {
        Err(anyhow!("watch-only wallet {} cannot sign", self.address))
    }
}
