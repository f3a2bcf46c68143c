//! In-memory ledger and wallet doubles shared by unit tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use solana_sdk::{
    hash::Hash,
    message::VersionedMessage,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};

use crate::{
    ledger::{Ledger, SignatureStatus, TokenAccountRecord, TokenAccountState, TokenAmount},
    wallet::WalletProvider,
};

const CLOSE_ACCOUNT_TAG: u8 = 9;
pub const RENT_EXEMPT_TOKEN_ACCOUNT: u64 = 2_039_280;

/// Fresh initialized SPL token account owned by `owner`.
pub fn record(owner: &Pubkey, amount: &str) -> TokenAccountRecord {
    TokenAccountRecord {
        address: Pubkey::new_unique(),
        program_id: spl_token::id(),
        lamports: RENT_EXEMPT_TOKEN_ACCOUNT,
        mint: Pubkey::new_unique(),
        owner: *owner,
        amount: TokenAmount {
            amount: amount.to_string(),
            decimals: 6,
            ui_amount_string: amount.to_string(),
        },
        state: TokenAccountState::Initialized,
        is_native: false,
        close_authority: None,
        withheld_fees: false,
    }
}

#[derive(Default)]
pub struct MockState {
    pub accounts: Vec<TokenAccountRecord>,
    pub sent: Vec<VersionedTransaction>,
    /// Zero-based index of the send call that fails.
    pub fail_send_at: Option<usize>,
    pub never_confirm: bool,
    /// Transactions land but the runtime rejects them with this error.
    pub fail_execution: Option<String>,
    /// Sends fail as expired once this many status polls have happened.
    pub expire_after_polls: Option<usize>,
    pub send_delay: Duration,
    pub discovery_calls: usize,
    pub status_polls: usize,
    /// Switched in on the next discovery call.
    pub switch_on_discovery: Option<(Arc<MockWallet>, Keypair)>,
}

/// Applies submitted close instructions to its own account set, so a
/// refresh after a close sees the account gone.
#[derive(Default)]
pub struct MockLedger {
    pub state: Mutex<MockState>,
}

impl MockLedger {
    pub fn set_accounts(&self, accounts: Vec<TokenAccountRecord>) {
        self.state.lock().unwrap().accounts = accounts;
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<TokenAccountRecord>> {
        let mut state = self.state.lock().unwrap();
        state.discovery_calls += 1;
        if let Some((wallet, keypair)) = state.switch_on_discovery.take() {
            wallet.switch_to(Some(keypair));
        }
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.owner == *owner && a.program_id == *program_id)
            .cloned()
            .collect())
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        Ok(Hash::new_unique())
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature> {
        let delay = self.state.lock().unwrap().send_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        let index = state.sent.len();
        state.sent.push(tx.clone());
        if state.fail_send_at == Some(index) {
            return Err(anyhow!("node rejected transaction {index}"));
        }
        if matches!(state.expire_after_polls, Some(n) if state.status_polls >= n) {
            return Err(anyhow!("Transaction simulation failed: Blockhash not found"));
        }
        if state.fail_execution.is_some() {
            return Ok(tx.signatures[0]);
        }

        let keys = tx.message.static_account_keys();
        for ix in tx.message.instructions() {
            let program = keys[ix.program_id_index as usize];
            let is_token_program = program == spl_token::id() || program == spl_token_2022::id();
            if is_token_program && ix.data.first() == Some(&CLOSE_ACCOUNT_TAG) {
                let closed = keys[ix.accounts[0] as usize];
                state.accounts.retain(|a| a.address != closed);
            }
        }
        Ok(tx.signatures[0])
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<SignatureStatus> {
        let mut state = self.state.lock().unwrap();
        state.status_polls += 1;
        Ok(if let Some(reason) = &state.fail_execution {
            SignatureStatus::Failed(reason.clone())
        } else if state.never_confirm {
            SignatureStatus::Pending
        } else {
            SignatureStatus::Confirmed
        })
    }
}

/// Keypair wallet that can disconnect, switch keys, or refuse to sign.
pub struct MockWallet {
    keypair: Mutex<Option<Arc<Keypair>>>,
    pub reject: AtomicBool,
    pub sign_calls: AtomicUsize,
}

impl MockWallet {
    pub fn connected() -> Self {
        Self {
            keypair: Mutex::new(Some(Arc::new(Keypair::new()))),
            reject: AtomicBool::new(false),
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            keypair: Mutex::new(None),
            reject: AtomicBool::new(false),
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn switch_to(&self, keypair: Option<Keypair>) {
        *self.keypair.lock().unwrap() = keypair.map(Arc::new);
    }

    pub fn owner(&self) -> Pubkey {
        self.address().expect("wallet connected")
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn address(&self) -> Option<Pubkey> {
        self.keypair.lock().unwrap().as_ref().map(|k| k.pubkey())
    }

    async fn sign_transaction(&self, message: VersionedMessage) -> Result<VersionedTransaction> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Err(anyhow!("user rejected the request"));
        }
        let keypair = self
            .keypair
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("wallet disconnected"))?;
        Ok(VersionedTransaction::try_new(message, &[&*keypair])?)
    }
}
