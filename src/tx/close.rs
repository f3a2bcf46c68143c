//! `CloseAccount` transactions.
//!
//! The owner pays the fee, signs as close authority and receives the
//! reclaimed lamports. Closes are packed into as few transactions as the
//! packet size allows.

use anyhow::{bail, Result};
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{Message, VersionedMessage},
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};

use crate::{
    accounts::EmptyTokenAccount,
    tx::wrapper::push_compute_budget_ix,
    utils::fees::close_cu_limit,
};

/// Unsigned close transaction plus the accounts it closes.
#[derive(Debug, Clone)]
pub struct CloseBatch {
    pub accounts: Vec<EmptyTokenAccount>,
    pub message: VersionedMessage,
}

impl CloseBatch {
    pub fn reclaimable_lamports(&self) -> u64 {
        self.accounts.iter().map(|a| a.lamports).sum()
    }
}

/// Batch layout without a blockhash, for dry runs.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub accounts: Vec<Pubkey>,
    pub reclaimable_lamports: u64,
}

pub fn build_close_instruction(
    program_id: &Pubkey,
    owner: &Pubkey,
    account: &Pubkey,
) -> Result<Instruction> {
    if *program_id == spl_token::id() {
        Ok(spl_token::instruction::close_account(
            program_id, account, owner, owner, &[],
        )?)
    } else if *program_id == spl_token_2022::id() {
        Ok(spl_token_2022::instruction::close_account(
            program_id, account, owner, owner, &[],
        )?)
    } else {
        bail!("{account} belongs to unsupported token program {program_id}")
    }
}

pub fn build_close_message(
    owner: &Pubkey,
    accounts: &[EmptyTokenAccount],
    blockhash: &Hash,
    priority_fee_sol: f64,
) -> Result<VersionedMessage> {
    let mut ixs = Vec::with_capacity(accounts.len() + 2);
    push_compute_budget_ix(&mut ixs, priority_fee_sol, close_cu_limit(accounts.len()));
    for account in accounts {
        ixs.push(build_close_instruction(
            &account.program_id,
            owner,
            &account.account_address,
        )?);
    }
    Ok(VersionedMessage::Legacy(Message::new_with_blockhash(
        &ixs,
        Some(owner),
        blockhash,
    )))
}

/// Serialized size of `message` once signed.
pub fn signed_size(message: &VersionedMessage) -> Result<usize> {
    let placeholder = VersionedTransaction {
        signatures: vec![
            Signature::default();
            message.header().num_required_signatures as usize
        ],
        message: message.clone(),
    };
    Ok(bincode::serialized_size(&placeholder)? as usize)
}

/// Split into chunks of at most `max_per_tx`, preserving order.
pub fn plan_batches(accounts: &[EmptyTokenAccount], max_per_tx: usize) -> Vec<BatchPlan> {
    accounts
        .chunks(max_per_tx.max(1))
        .map(|chunk| BatchPlan {
            accounts: chunk.iter().map(|a| a.account_address).collect(),
            reclaimable_lamports: chunk.iter().map(|a| a.lamports).sum(),
        })
        .collect()
}

fn push_fitting(
    owner: &Pubkey,
    accounts: &[EmptyTokenAccount],
    blockhash: &Hash,
    priority_fee_sol: f64,
    out: &mut Vec<CloseBatch>,
) -> Result<()> {
    let message = build_close_message(owner, accounts, blockhash, priority_fee_sol)?;
    if signed_size(&message)? <= PACKET_DATA_SIZE {
        out.push(CloseBatch {
            accounts: accounts.to_vec(),
            message,
        });
        return Ok(());
    }
    if accounts.len() == 1 {
        bail!(
            "close of {} does not fit in a single transaction",
            accounts[0].account_address
        );
    }
    let (left, right) = accounts.split_at(accounts.len() / 2);
    push_fitting(owner, left, blockhash, priority_fee_sol, out)?;
    push_fitting(owner, right, blockhash, priority_fee_sol, out)
}

/// Build every close transaction for `accounts`. Chunks that would exceed
/// the packet size are halved until they fit.
pub fn build_close_batches(
    owner: &Pubkey,
    accounts: &[EmptyTokenAccount],
    max_per_tx: usize,
    blockhash: &Hash,
    priority_fee_sol: f64,
) -> Result<Vec<CloseBatch>> {
    let mut batches = Vec::new();
    for chunk in accounts.chunks(max_per_tx.max(1)) {
        push_fitting(owner, chunk, blockhash, priority_fee_sol, &mut batches)?;
    }
    Ok(batches)
}
