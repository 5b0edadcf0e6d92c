mod mempool_rate;
mod mempool_update;
mod stripped_transaction;
mod transaction_extended;

pub use mempool_rate::*;
pub use mempool_update::*;
pub use stripped_transaction::*;
pub use transaction_extended::*;
