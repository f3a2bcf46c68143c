//! Program-agnostic helpers for composing transactions.

use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;

use crate::utils::fees::fee_to_cu_price;

/// Append compute budget instructions for `fee_sol` spread over
/// `cu_limit` units. Nothing is added when no priority fee is configured.
pub fn push_compute_budget_ix(ixs: &mut Vec<Instruction>, fee_sol: f64, cu_limit: u32) {
    if fee_sol > 0.0 {
        ixs.push(ComputeBudgetInstruction::set_compute_unit_limit(cu_limit));

        let price = fee_to_cu_price(fee_sol, cu_limit);
        if price > 0 {
            ixs.push(ComputeBudgetInstruction::set_compute_unit_price(price));
        }
    }
}
