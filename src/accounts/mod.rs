//! Empty token account discovery.
//!
//! Pulls every token account of an owner, keeps the zero-balance ones,
//! names them through the token registry and orders the result so
//! named tokens come first (alphabetically) and unknown mints last.

use std::cmp::Ordering;

use anyhow::Result;
use log::info;
use solana_sdk::pubkey::Pubkey;

use crate::{
    ledger::{Ledger, TokenAccountRecord, TokenAccountState, TokenAmount},
    registry::TokenRegistry,
};

/// Token programs scanned by default.
pub fn token_programs(include_token_2022: bool) -> Vec<Pubkey> {
    let mut programs = vec![spl_token::id()];
    if include_token_2022 {
        programs.push(spl_token_2022::id());
    }
    programs
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmptyTokenAccount {
    pub account_address: Pubkey,
    pub mint_address: Pubkey,
    pub amount: TokenAmount,
    pub name: Option<String>,
    pub program_id: Pubkey,
    /// Reserve returned to the owner on close.
    pub lamports: u64,
    pub frozen: bool,
    /// Close authority other than the owner, if any.
    pub foreign_close_authority: Option<Pubkey>,
    pub withheld_fees: bool,
}

impl EmptyTokenAccount {
    fn from_record(record: TokenAccountRecord, owner: &Pubkey, registry: &TokenRegistry) -> Self {
        let name = registry.name(&record.mint).map(str::to_string);
        let foreign_close_authority = record.close_authority.filter(|auth| auth != owner);
        Self {
            account_address: record.address,
            mint_address: record.mint,
            amount: record.amount,
            name,
            program_id: record.program_id,
            lamports: record.lamports,
            frozen: record.state == TokenAccountState::Frozen,
            foreign_close_authority,
            withheld_fees: record.withheld_fees,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    /// Why the owner cannot close this account, if they cannot.
    pub fn blocker(&self) -> Option<String> {
        if self.frozen {
            return Some("account is frozen".to_string());
        }
        if self.withheld_fees {
            return Some("withheld transfer fees".to_string());
        }
        self.foreign_close_authority
            .map(|auth| format!("close authority is {auth}"))
    }

    pub fn is_closable(&self) -> bool {
        self.blocker().is_none()
    }
}

/// Names compare case-insensitively first; on a case-only tie the
/// lowercase spelling sorts first.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// Named accounts by name, unnamed ones after them in ledger order.
pub fn sort_for_display(accounts: &mut [EmptyTokenAccount]) {
    accounts.sort_by(|a, b| match (&a.name, &b.name) {
        (Some(x), Some(y)) => compare_names(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Keep zero-balance records owned by `owner` and shape them for display.
pub fn select_empty_accounts(
    records: Vec<TokenAccountRecord>,
    owner: &Pubkey,
    registry: &TokenRegistry,
) -> Vec<EmptyTokenAccount> {
    let mut empty: Vec<EmptyTokenAccount> = records
        .into_iter()
        .filter(|record| record.amount.is_zero() && record.owner == *owner)
        .map(|record| EmptyTokenAccount::from_record(record, owner, registry))
        .collect();
    sort_for_display(&mut empty);
    empty
}

pub async fn list_empty_token_accounts(
    ledger: &dyn Ledger,
    owner: &Pubkey,
    registry: &TokenRegistry,
    programs: &[Pubkey],
) -> Result<Vec<EmptyTokenAccount>> {
    let mut records = Vec::new();
    for program_id in programs {
        records.extend(ledger.token_accounts_by_owner(owner, program_id).await?);
    }
    let total = records.len();

    let empty = select_empty_accounts(records, owner, registry);
    info!(
        "🔍 [DISCOVERY] {} of {} token accounts owned by {} are empty",
        empty.len(),
        total,
        owner
    );
    Ok(empty)
}
