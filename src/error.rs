//! Workflow errors callers are expected to match on.
//!
//! Plumbing failures (settings, RPC transport, decoding) stay `anyhow`
//! and surface here wrapped in [`ReclaimError::Ledger`].

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReclaimError {
    #[error("a close submission is already in flight")]
    Busy,

    #[error("no wallet connected")]
    WalletNotConnected,

    #[error("account {0} is not in the current empty-account listing")]
    UnknownAccount(Pubkey),

    #[error("account {account} cannot be closed by its owner: {reason}")]
    NotClosable { account: Pubkey, reason: String },

    #[error("wallet refused to sign: {0}")]
    SigningRejected(String),

    #[error("nothing to close")]
    NothingToClose,

    #[error("ledger request failed: {0:#}")]
    Ledger(#[from] anyhow::Error),
}

pub type ReclaimResult<T> = std::result::Result<T, ReclaimError>;
