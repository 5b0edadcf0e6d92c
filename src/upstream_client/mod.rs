mod domain;
mod esplora_client;
mod upstream_client;

pub use domain::*;
pub use esplora_client::*;
pub use upstream_client::*;
