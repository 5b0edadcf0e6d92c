use async_trait::async_trait;

use super::{MempoolInfo, RawTransaction};
use crate::{error_fmt::error_chain_fmt, mempool_engine::Txid};

/// Contract to the blockchain node the mirror tracks. No ordering or
/// consistency guarantees hold across the three calls; the pool may change
/// between a listing and the per-transaction fetches.
#[async_trait]
pub trait MempoolUpstream: Send + Sync {
    /// Current set of pending transaction ids, unordered. Failure aborts
    /// the running pass.
    async fn list_pending_ids(&self) -> Result<Vec<Txid>, UpstreamError>;

    /// Fetches one transaction. `Ok(None)` means the node no longer knows
    /// the id (evicted between listing and fetch) and is not an error.
    async fn get_transaction(&self, txid: &Txid) -> Result<Option<RawTransaction>, UpstreamError>;

    /// The node's self-reported pool summary.
    async fn get_mempool_info(&self) -> Result<MempoolInfo, UpstreamError>;
}

#[derive(thiserror::Error)]
pub enum UpstreamError {
    #[error("request to the upstream node failed")]
    Transport(#[from] reqwest::Error),
    #[error("upstream answered {status} for {endpoint}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: String,
    },
}

impl std::fmt::Debug for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
