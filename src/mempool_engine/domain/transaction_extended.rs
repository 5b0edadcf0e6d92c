use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::upstream_client::RawTransaction;

pub type Txid = String;

/// Published view of the cache. Swapped wholesale at the end of a pass;
/// holders must treat the map behind the `Arc` as frozen.
pub type MempoolSnapshot = Arc<HashMap<Txid, Arc<TransactionExtended>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionExtended {
    pub txid: Txid,
    pub weight: u64,
    pub fee: Option<u64>,
    pub vsize: f64,
    pub fee_per_vsize: f64,
    pub first_seen: u64,
    /// Remainder of the upstream payload, passed through untouched.
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl TransactionExtended {
    /// Derives `vsize` and `fee_per_vsize` from the upstream payload.
    /// Both are fixed here and never recomputed.
    pub fn ingest(raw: RawTransaction, first_seen: u64) -> Self {
        let vsize = raw.weight as f64 / 4.0;
        let fee_per_vsize = match raw.fee {
            Some(fee) if vsize > 0.0 => fee as f64 / vsize,
            _ => 0.0,
        };
        Self {
            txid: raw.txid,
            weight: raw.weight,
            fee: raw.fee,
            vsize,
            fee_per_vsize,
            first_seen,
            raw: raw.rest,
        }
    }
}
