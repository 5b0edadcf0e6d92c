mod domain;
mod flush_guard;
mod latest_arrivals;
mod mempool_engine;
mod observer;
mod rate_tracker;

pub use domain::*;
pub use flush_guard::*;
pub use latest_arrivals::*;
pub use mempool_engine::*;
pub use observer::*;
pub use rate_tracker::*;
