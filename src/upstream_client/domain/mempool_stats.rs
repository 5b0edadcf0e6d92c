use serde::{Deserialize, Serialize};

use super::MempoolInfo;

/// Wire shape of the node's `/mempool` summary endpoint.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MempoolStats {
    pub count: u64,
    pub vsize: u64,
    pub total_fee: u64,
}

impl From<MempoolStats> for MempoolInfo {
    fn from(stats: MempoolStats) -> Self {
        Self {
            size: stats.count,
            bytes: stats.vsize,
        }
    }
}
