//! Plain-text presentation of listings and close results.

use std::fmt::Write;

use solana_sdk::{native_token::lamports_to_sol, pubkey::Pubkey};

use crate::{accounts::EmptyTokenAccount, session::CloseReport, tx::BatchPlan};

pub fn account_url(explorer: &str, address: &Pubkey) -> String {
    format!("{explorer}/account/{address}")
}

pub fn token_url(explorer: &str, mint: &Pubkey) -> String {
    format!("{explorer}/token/{mint}")
}

pub fn tx_url(explorer: &str, signature: &impl std::fmt::Display) -> String {
    format!("{explorer}/tx/{signature}")
}

pub fn connected(explorer: &str, owner: &Pubkey) -> String {
    format!(
        "Connected to\n  {owner}\n  {}\n",
        account_url(explorer, owner)
    )
}

pub fn listing(explorer: &str, accounts: &[EmptyTokenAccount]) -> String {
    if accounts.is_empty() {
        return "No empty accounts\n".to_string();
    }

    let mut out = String::from("Zero balance token accounts\n");
    for account in accounts {
        let marker = if account.frozen {
            " (frozen)"
        } else if !account.is_closable() {
            " (not closable)"
        } else {
            ""
        };
        let _ = writeln!(out, "\n  {}{}", account.display_name(), marker);
        let _ = writeln!(
            out,
            "    mint     {}  {}",
            account.mint_address,
            token_url(explorer, &account.mint_address)
        );
        let _ = writeln!(out, "    account  {}", account.account_address);
        let _ = writeln!(
            out,
            "    reserve  {:.9} SOL",
            lamports_to_sol(account.lamports)
        );
    }

    let closable: Vec<_> = accounts.iter().filter(|a| a.is_closable()).collect();
    let reserve: u64 = closable.iter().map(|a| a.lamports).sum();
    let _ = writeln!(
        out,
        "\n{} closable, {:.9} SOL reclaimable",
        closable.len(),
        lamports_to_sol(reserve)
    );
    out
}

pub fn plan(plans: &[BatchPlan]) -> String {
    let mut out = String::new();
    for (i, batch) in plans.iter().enumerate() {
        let _ = writeln!(
            out,
            "tx #{}: {} account(s), {:.9} SOL",
            i + 1,
            batch.accounts.len(),
            lamports_to_sol(batch.reclaimable_lamports)
        );
        for account in &batch.accounts {
            let _ = writeln!(out, "    {account}");
        }
    }
    out
}

pub fn report(explorer: &str, report: &CloseReport) -> String {
    let mut out = String::new();
    for batch in &report.batches {
        let status = if batch.confirmed { "confirmed" } else { "FAILED" };
        match &batch.signature {
            Some(sig) => {
                let _ = writeln!(out, "{status}  {}", tx_url(explorer, sig));
            }
            None => {
                let _ = writeln!(out, "{status}  (not submitted)");
            }
        }
        if let Some(err) = &batch.error {
            let _ = writeln!(out, "    {err}");
        }
    }
    let _ = writeln!(
        out,
        "closed {} account(s), reclaimed {:.9} SOL at {}",
        report.closed_accounts(),
        lamports_to_sol(report.reclaimed_lamports()),
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out
}
