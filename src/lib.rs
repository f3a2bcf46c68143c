pub mod accounts;
pub mod config;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod render;
pub mod session;
pub mod tx;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ReclaimError, ReclaimResult};
