//! Reclaim session: tracks the connected wallet, holds the current
//! empty-account listing and runs close submissions one at a time.
//!
//! While a submission is in flight every close or refresh request is
//! rejected with [`ReclaimError::Busy`]; the listing is re-discovered
//! after the submitted transactions confirm (or time out).

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tokio::time::Instant;

use crate::{
    accounts::{list_empty_token_accounts, token_programs, EmptyTokenAccount},
    config::Settings,
    error::{ReclaimError, ReclaimResult},
    ledger::{Ledger, SignatureStatus},
    registry::TokenRegistry,
    tx::build_close_batches,
    wallet::WalletProvider,
};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub programs: Vec<Pubkey>,
    pub max_closes_per_tx: usize,
    pub priority_fee_sol: f64,
    pub confirm_timeout: Duration,
    pub confirm_poll_interval: Duration,
    /// Pause between confirmation and re-discovery so the node serving
    /// reads has caught up.
    pub settle_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            programs: token_programs(true),
            max_closes_per_tx: 20,
            priority_fee_sol: 0.0,
            confirm_timeout: Duration::from_secs(60),
            confirm_poll_interval: Duration::from_millis(500),
            settle_delay: Duration::from_secs(4),
        }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            programs: token_programs(settings.include_token_2022),
            max_closes_per_tx: settings.max_closes_per_tx,
            priority_fee_sol: settings.priority_fee_sol,
            confirm_timeout: settings.confirm_timeout(),
            confirm_poll_interval: settings.confirm_poll_interval(),
            settle_delay: settings.settle_delay(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub accounts: Vec<Pubkey>,
    pub signature: Option<Signature>,
    pub reclaimable_lamports: u64,
    pub confirmed: bool,
    pub error: Option<String>,
}

impl BatchOutcome {
    fn is_unresolved(&self) -> bool {
        self.signature.is_some() && !self.confirmed && self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CloseReport {
    pub owner: Pubkey,
    pub batches: Vec<BatchOutcome>,
    pub finished_at: DateTime<Utc>,
}

impl CloseReport {
    /// Lamports returned by confirmed transactions only.
    pub fn reclaimed_lamports(&self) -> u64 {
        self.batches
            .iter()
            .filter(|b| b.confirmed)
            .map(|b| b.reclaimable_lamports)
            .sum()
    }

    pub fn closed_accounts(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.confirmed)
            .map(|b| b.accounts.len())
            .sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.batches.iter().filter(|b| !b.confirmed).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed_batches() == 0
    }
}

#[derive(Default)]
struct SessionState {
    owner: Option<Pubkey>,
    accounts: Vec<EmptyTokenAccount>,
}

/// Clears the busy flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> ReclaimResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ReclaimError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ReclaimSession {
    ledger: Arc<dyn Ledger>,
    wallet: Arc<dyn WalletProvider>,
    registry: Arc<TokenRegistry>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    busy: AtomicBool,
}

impl ReclaimSession {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        wallet: Arc<dyn WalletProvider>,
        registry: Arc<TokenRegistry>,
        options: SessionOptions,
    ) -> Self {
        Self {
            ledger,
            wallet,
            registry,
            options,
            state: Mutex::new(SessionState::default()),
            busy: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn owner(&self) -> Option<Pubkey> {
        self.state().owner
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Snapshot of the last discovery.
    pub fn empty_accounts(&self) -> Vec<EmptyTokenAccount> {
        self.state().accounts.clone()
    }

    /// Reserve held by the accounts the owner can close.
    pub fn reclaimable_lamports(&self) -> u64 {
        self.state()
            .accounts
            .iter()
            .filter(|a| a.is_closable())
            .map(|a| a.lamports)
            .sum()
    }

    /// Re-read the wallet and re-run discovery.
    pub async fn refresh(&self) -> ReclaimResult<Vec<EmptyTokenAccount>> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        self.discover().await
    }

    pub async fn close_account(&self, account: &Pubkey) -> ReclaimResult<CloseReport> {
        self.close_accounts(std::slice::from_ref(account)).await
    }

    pub async fn close_accounts(&self, addresses: &[Pubkey]) -> ReclaimResult<CloseReport> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let owner = self.sync_owner()?;

        let targets = {
            let state = self.state();
            let mut seen = HashSet::new();
            let mut targets = Vec::with_capacity(addresses.len());
            for address in addresses {
                if !seen.insert(*address) {
                    continue;
                }
                let account = state
                    .accounts
                    .iter()
                    .find(|a| a.account_address == *address)
                    .ok_or(ReclaimError::UnknownAccount(*address))?;
                if let Some(reason) = account.blocker() {
                    return Err(ReclaimError::NotClosable {
                        account: *address,
                        reason,
                    });
                }
                targets.push(account.clone());
            }
            targets
        };

        self.submit_and_refresh(owner, targets).await
    }

    /// Close every closable account of the current listing.
    pub async fn close_all(&self) -> ReclaimResult<CloseReport> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let owner = self.sync_owner()?;

        let targets: Vec<EmptyTokenAccount> = {
            let state = self.state();
            for blocked in state.accounts.iter().filter(|a| !a.is_closable()) {
                warn!(
                    "⏭️ [CLOSE] Skipping {}: {}",
                    blocked.account_address,
                    blocked.blocker().unwrap_or_default()
                );
            }
            state
                .accounts
                .iter()
                .filter(|a| a.is_closable())
                .cloned()
                .collect()
        };

        self.submit_and_refresh(owner, targets).await
    }

    /// Track wallet changes: a new address (or a disconnect) drops the
    /// previous owner's listing.
    fn sync_owner(&self) -> ReclaimResult<Pubkey> {
        let current = self.wallet.address();
        let mut state = self.state();
        if state.owner != current {
            match current {
                Some(owner) => info!("👛 [SESSION] Wallet connected: {}", owner),
                None => info!("👛 [SESSION] Wallet disconnected"),
            }
            state.owner = current;
            state.accounts.clear();
        }
        current.ok_or(ReclaimError::WalletNotConnected)
    }

    async fn discover(&self) -> ReclaimResult<Vec<EmptyTokenAccount>> {
        loop {
            let owner = self.sync_owner()?;
            let accounts = list_empty_token_accounts(
                self.ledger.as_ref(),
                &owner,
                &self.registry,
                &self.options.programs,
            )
            .await?;

            // The wallet may have switched while the node answered.
            if self.wallet.address() != Some(owner) {
                debug!("🔁 [SESSION] Wallet changed during discovery, retrying");
                continue;
            }

            let mut state = self.state();
            state.accounts = accounts.clone();
            return Ok(accounts);
        }
    }

    async fn submit_and_refresh(
        &self,
        owner: Pubkey,
        targets: Vec<EmptyTokenAccount>,
    ) -> ReclaimResult<CloseReport> {
        if targets.is_empty() {
            return Err(ReclaimError::NothingToClose);
        }

        let blockhash = self.ledger.latest_blockhash().await?;
        let batches = build_close_batches(
            &owner,
            &targets,
            self.options.max_closes_per_tx,
            &blockhash,
            self.options.priority_fee_sol,
        )?;
        info!(
            "🧹 [CLOSE] Closing {} accounts in {} transaction(s) for {}",
            targets.len(),
            batches.len(),
            owner
        );

        let messages = batches.iter().map(|b| b.message.clone()).collect();
        let signed = self
            .wallet
            .sign_all_transactions(messages)
            .await
            .map_err(|e| ReclaimError::SigningRejected(format!("{e:#}")))?;
        if signed.len() != batches.len() {
            return Err(ReclaimError::SigningRejected(format!(
                "wallet returned {} of {} transactions",
                signed.len(),
                batches.len()
            )));
        }

        let mut outcomes = Vec::with_capacity(batches.len());
        for (batch, tx) in batches.iter().zip(&signed) {
            let mut outcome = BatchOutcome {
                accounts: batch.accounts.iter().map(|a| a.account_address).collect(),
                signature: None,
                reclaimable_lamports: batch.reclaimable_lamports(),
                confirmed: false,
                error: None,
            };
            match self.ledger.send_transaction(tx).await {
                Ok(signature) => {
                    info!(
                        "📤 [CLOSE] Submitted {} ({} accounts)",
                        signature,
                        outcome.accounts.len()
                    );
                    outcome.signature = Some(signature);
                }
                Err(e) => {
                    error!("❌ [CLOSE] Submission failed: {:#}", e);
                    outcome.error = Some(format!("{e:#}"));
                }
            }
            outcomes.push(outcome);
        }

        // Everything shares one blockhash, so confirmation starts only
        // once every batch is out.
        self.await_confirmations(&mut outcomes).await;

        if outcomes.iter().any(|o| o.signature.is_some()) {
            tokio::time::sleep(self.options.settle_delay).await;
        }
        if let Err(e) = self.discover().await {
            warn!("⚠️ [SESSION] Refresh after close failed: {}", e);
        }

        Ok(CloseReport {
            owner,
            batches: outcomes,
            finished_at: Utc::now(),
        })
    }

    /// Poll every submitted batch until it confirms, fails on chain, or
    /// the confirm timeout runs out.
    async fn await_confirmations(&self, outcomes: &mut [BatchOutcome]) {
        let deadline = Instant::now() + self.options.confirm_timeout;
        loop {
            let mut pending = 0;
            for outcome in outcomes.iter_mut().filter(|o| o.is_unresolved()) {
                let Some(signature) = outcome.signature else {
                    continue;
                };
                match self.ledger.signature_status(&signature).await {
                    Ok(SignatureStatus::Confirmed) => {
                        info!("✅ [CLOSE] Confirmed {}", signature);
                        outcome.confirmed = true;
                    }
                    Ok(SignatureStatus::Failed(reason)) => {
                        error!("❌ [CLOSE] {} failed on chain: {}", signature, reason);
                        outcome.error = Some(format!("transaction failed: {reason}"));
                    }
                    Ok(SignatureStatus::Pending) => pending += 1,
                    Err(e) => {
                        debug!("🔎 [CLOSE] Status of {} unavailable: {:#}", signature, e);
                        pending += 1;
                    }
                }
            }
            if pending == 0 {
                return;
            }
            if Instant::now() >= deadline {
                for outcome in outcomes.iter_mut().filter(|o| o.is_unresolved()) {
                    if let Some(signature) = outcome.signature {
                        warn!("⌛ [CLOSE] {} not confirmed in time", signature);
                    }
                    outcome.error = Some(format!(
                        "not confirmed within {}ms",
                        self.options.confirm_timeout.as_millis()
                    ));
                }
                return;
            }
            tokio::time::sleep(self.options.confirm_poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TokenAccountState;
    use crate::testing::{record, MockLedger, MockWallet, RENT_EXEMPT_TOKEN_ACCOUNT};
    use solana_sdk::signature::{Keypair, Signer};

    fn fast_options() -> SessionOptions {
        SessionOptions {
            confirm_timeout: Duration::from_millis(30),
            confirm_poll_interval: Duration::from_millis(5),
            settle_delay: Duration::ZERO,
            ..SessionOptions::default()
        }
    }

    fn session_with(
        ledger: &Arc<MockLedger>,
        wallet: &Arc<MockWallet>,
        options: SessionOptions,
    ) -> ReclaimSession {
        ReclaimSession::new(
            ledger.clone(),
            wallet.clone(),
            Arc::new(TokenRegistry::empty()),
            options,
        )
    }

    fn setup_with(
        empty: usize,
        funded: usize,
        options: SessionOptions,
    ) -> (Arc<MockLedger>, Arc<MockWallet>, ReclaimSession) {
        let ledger = Arc::new(MockLedger::default());
        let wallet = Arc::new(MockWallet::connected());
        let owner = wallet.owner();
        let mut accounts: Vec<_> = (0..empty).map(|_| record(&owner, "0")).collect();
        accounts.extend((0..funded).map(|_| record(&owner, "1000")));
        ledger.set_accounts(accounts);
        let session = session_with(&ledger, &wallet, options);
        (ledger, wallet, session)
    }

    fn setup(empty: usize, funded: usize) -> (Arc<MockLedger>, Arc<MockWallet>, ReclaimSession) {
        setup_with(empty, funded, fast_options())
    }

    fn one_close_per_tx() -> SessionOptions {
        SessionOptions {
            max_closes_per_tx: 1,
            ..fast_options()
        }
    }

    #[tokio::test]
    async fn test_refresh_lists_empty_accounts() {
        let (_ledger, wallet, session) = setup(3, 2);
        let listed = session.refresh().await.unwrap();

        assert_eq!(listed.len(), 3);
        assert_eq!(session.owner(), Some(wallet.owner()));
        assert_eq!(session.empty_accounts(), listed);
        assert_eq!(session.reclaimable_lamports(), 3 * RENT_EXEMPT_TOKEN_ACCOUNT);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_disconnected_wallet() {
        let ledger = Arc::new(MockLedger::default());
        let wallet = Arc::new(MockWallet::disconnected());
        let session = session_with(&ledger, &wallet, fast_options());

        assert!(matches!(
            session.refresh().await,
            Err(ReclaimError::WalletNotConnected)
        ));
        assert!(session.empty_accounts().is_empty());
        assert!(matches!(
            session.close_all().await,
            Err(ReclaimError::WalletNotConnected)
        ));
    }

    #[tokio::test]
    async fn test_wallet_switch_resets_listing() {
        let (ledger, wallet, session) = setup(2, 0);
        session.refresh().await.unwrap();
        let first = session.empty_accounts()[0].account_address;

        let other = Keypair::new();
        let other_owner = other.pubkey();
        ledger.with(|s| s.accounts.push(record(&other_owner, "0")));
        wallet.switch_to(Some(other));

        // Switching alone already invalidates the old owner's accounts.
        assert!(matches!(
            session.close_account(&first).await,
            Err(ReclaimError::UnknownAccount(_))
        ));
        let listed = session.refresh().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(session.owner(), Some(other_owner));

        wallet.switch_to(None);
        assert!(session.refresh().await.is_err());
        assert!(session.empty_accounts().is_empty());
    }

    #[tokio::test]
    async fn test_close_single_account() {
        let (ledger, wallet, session) = setup(2, 1);
        let listed = session.refresh().await.unwrap();
        let target = listed[0].account_address;

        let report = session.close_account(&target).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.closed_accounts(), 1);
        assert_eq!(report.reclaimed_lamports(), RENT_EXEMPT_TOKEN_ACCOUNT);
        assert_eq!(report.owner, wallet.owner());
        assert!(report.batches[0].signature.is_some());

        let sent = ledger.with(|s| s.sent.clone());
        assert_eq!(sent.len(), 1);
        // one scan per token program, before and after the close
        assert_eq!(ledger.with(|s| s.discovery_calls), 4);
        assert_eq!(sent[0].message.static_account_keys()[0], wallet.owner());

        let remaining = session.empty_accounts();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|a| a.account_address != target));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_close_all_in_batches() {
        let (ledger, wallet, session) = setup_with(
            5,
            0,
            SessionOptions {
                max_closes_per_tx: 2,
                ..fast_options()
            },
        );
        session.refresh().await.unwrap();

        let report = session.close_all().await.unwrap();

        assert_eq!(report.batches.len(), 3);
        assert_eq!(report.closed_accounts(), 5);
        assert_eq!(report.reclaimed_lamports(), 5 * RENT_EXEMPT_TOKEN_ACCOUNT);
        assert_eq!(ledger.with(|s| s.sent.len()), 3);
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 3);
        assert!(session.empty_accounts().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_blocked_accounts_rejected() {
        let (ledger, wallet, session) = setup(1, 0);
        let owner = wallet.owner();
        let mut frozen = record(&owner, "0");
        frozen.state = TokenAccountState::Frozen;
        ledger.with(|s| s.accounts.push(frozen.clone()));
        session.refresh().await.unwrap();

        assert!(matches!(
            session.close_account(&Pubkey::new_unique()).await,
            Err(ReclaimError::UnknownAccount(_))
        ));
        assert!(matches!(
            session.close_account(&frozen.address).await,
            Err(ReclaimError::NotClosable { .. })
        ));
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);

        // close_all skips the frozen account and closes the rest
        let report = session.close_all().await.unwrap();
        assert_eq!(report.closed_accounts(), 1);
        assert_eq!(session.empty_accounts().len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_to_close() {
        let (_ledger, _wallet, session) = setup(0, 3);
        session.refresh().await.unwrap();
        assert!(matches!(
            session.close_all().await,
            Err(ReclaimError::NothingToClose)
        ));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_signing_rejection_submits_nothing() {
        let (ledger, wallet, session) = setup(2, 0);
        session.refresh().await.unwrap();
        wallet.reject.store(true, Ordering::SeqCst);

        assert!(matches!(
            session.close_all().await,
            Err(ReclaimError::SigningRejected(_))
        ));
        assert!(ledger.with(|s| s.sent.is_empty()));
        assert!(!session.is_busy());
        assert_eq!(session.empty_accounts().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected_while_busy() {
        let (ledger, _wallet, session) = setup(2, 0);
        session.refresh().await.unwrap();
        ledger.with(|s| s.send_delay = Duration::from_millis(50));

        let (first, second, refresh) = tokio::join!(
            session.close_all(),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(session.is_busy());
                session.close_all().await
            },
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                session.refresh().await
            }
        );

        assert_eq!(first.unwrap().closed_accounts(), 2);
        assert!(matches!(second, Err(ReclaimError::Busy)));
        assert!(matches!(refresh, Err(ReclaimError::Busy)));
        assert_eq!(ledger.with(|s| s.sent.len()), 1);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_partial_failure_reported_per_batch() {
        let (ledger, _wallet, session) = setup_with(3, 0, one_close_per_tx());
        ledger.with(|s| s.fail_send_at = Some(1));
        session.refresh().await.unwrap();

        let report = session.close_all().await.unwrap();

        assert_eq!(report.batches.len(), 3);
        assert_eq!(report.failed_batches(), 1);
        assert!(report.batches[1].signature.is_none());
        assert!(report.batches[1].error.is_some());
        assert_eq!(report.closed_accounts(), 2);
        assert_eq!(session.empty_accounts().len(), 1);
        assert_eq!(
            session.empty_accounts()[0].account_address,
            report.batches[1].accounts[0]
        );
    }

    #[tokio::test]
    async fn test_unconfirmed_transaction_times_out() {
        let (ledger, _wallet, session) = setup(1, 0);
        ledger.with(|s| s.never_confirm = true);
        session.refresh().await.unwrap();

        let report = session.close_all().await.unwrap();

        assert!(!report.is_success());
        assert!(report.batches[0].signature.is_some());
        assert!(!report.batches[0].confirmed);
        assert!(report.batches[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("not confirmed within"));
        assert_eq!(report.reclaimed_lamports(), 0);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_failed_execution_stops_polling() {
        let (ledger, _wallet, session) = setup(2, 0);
        ledger.with(|s| s.fail_execution = Some("custom program error: 0x23".to_string()));
        session.refresh().await.unwrap();

        let report = session.close_all().await.unwrap();

        assert_eq!(ledger.with(|s| s.status_polls), 1);
        let batch = &report.batches[0];
        assert!(batch.signature.is_some());
        assert!(!batch.confirmed);
        assert!(batch.error.as_deref().unwrap().contains("custom program error: 0x23"));
        assert_eq!(report.reclaimed_lamports(), 0);
        assert_eq!(session.empty_accounts().len(), 2);
    }

    #[tokio::test]
    async fn test_all_batches_sent_before_confirming() {
        let (ledger, _wallet, session) = setup_with(3, 0, one_close_per_tx());
        ledger.with(|s| s.expire_after_polls = Some(1));
        session.refresh().await.unwrap();

        let report = session.close_all().await.unwrap();

        assert_eq!(report.batches.len(), 3);
        assert!(report.is_success());
        assert_eq!(report.closed_accounts(), 3);
        assert!(session.empty_accounts().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_switch_during_discovery_retries() {
        let (ledger, wallet, session) = setup(2, 0);
        let other = Keypair::new();
        let other_owner = other.pubkey();
        let other_account = record(&other_owner, "0");
        ledger.with(|s| {
            s.accounts.push(other_account.clone());
            s.switch_on_discovery = Some((wallet.clone(), other));
        });

        let listed = session.refresh().await.unwrap();

        assert_eq!(session.owner(), Some(other_owner));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].account_address, other_account.address);
        assert_eq!(session.empty_accounts(), listed);
        // the first pass is thrown away and repeated for the new owner
        assert_eq!(ledger.with(|s| s.discovery_calls), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_after_submission() {
        let settle = Duration::from_secs(4);
        let (_ledger, _wallet, session) = setup_with(
            1,
            0,
            SessionOptions {
                settle_delay: settle,
                ..fast_options()
            },
        );
        session.refresh().await.unwrap();

        let started = Instant::now();
        let report = session.close_all().await.unwrap();

        assert!(report.is_success());
        assert!(started.elapsed() >= settle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_skipped_when_nothing_sent() {
        let settle = Duration::from_secs(4);
        let (ledger, _wallet, session) = setup_with(
            1,
            0,
            SessionOptions {
                settle_delay: settle,
                ..fast_options()
            },
        );
        ledger.with(|s| s.fail_send_at = Some(0));
        session.refresh().await.unwrap();

        let started = Instant::now();
        let report = session.close_all().await.unwrap();

        assert_eq!(report.failed_batches(), 1);
        assert!(report.batches[0].signature.is_none());
        assert!(started.elapsed() < settle);
    }
}
