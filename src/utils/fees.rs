//! Fee‑related math helpers shared by the close builders.

use solana_sdk::native_token::LAMPORTS_PER_SOL;

/// Compute units budgeted per `CloseAccount` instruction. Token-2022
/// accounts with extensions cost more than classic SPL accounts, so the
/// budget covers the heavier case.
pub const CLOSE_ACCOUNT_CU: u32 = 5_000;

/// Headroom for the compute budget instructions themselves.
pub const BASE_CU: u32 = 1_000;

/// Compute unit limit for a transaction closing `closes` accounts.
pub fn close_cu_limit(closes: usize) -> u32 {
    BASE_CU.saturating_add(CLOSE_ACCOUNT_CU.saturating_mul(closes as u32))
}

/// Convert a *total* priority‑fee amount (expressed in **SOL**) into the
/// per‑compute‑unit price (micro-lamports) that `ComputeBudgetInstruction`
/// expects.
pub fn fee_to_cu_price(total_sol: f64, cu_limit: u32) -> u64 {
    if total_sol <= 0.0 || cu_limit == 0 {
        return 0;
    }
    let total_micro_lamports = total_sol * LAMPORTS_PER_SOL as f64 * 1_000_000.0;
    (total_micro_lamports / cu_limit as f64).round() as u64
}
