mod mempool_info;
mod mempool_stats;
mod raw_transaction;

pub use mempool_info::*;
pub use mempool_stats::*;
pub use raw_transaction::*;
