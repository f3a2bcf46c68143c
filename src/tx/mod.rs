pub mod close;
pub mod wrapper;

pub use close::{build_close_batches, build_close_instruction, plan_batches, BatchPlan, CloseBatch};
