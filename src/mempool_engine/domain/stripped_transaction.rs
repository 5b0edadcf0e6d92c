use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::TransactionExtended;

/// Projection of a cached transaction kept for the latest-arrivals list.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrippedTransaction {
    pub txid: String,
    pub fee: u64,
    pub vsize: f64,
    pub fee_per_vsize: f64,
    pub value: u64,
}

/// Injected projection function; the engine never looks inside the result.
pub type Stripper = Arc<dyn Fn(&TransactionExtended) -> StrippedTransaction + Send + Sync>;

/// Keeps the identifier, the fee figures (including the ingest-time fee
/// density), and the summed output value when the upstream payload carries
/// a `vout` array.
pub fn default_stripper(tx: &TransactionExtended) -> StrippedTransaction {
    let value = tx
        .raw
        .get("vout")
        .and_then(|vout| vout.as_array())
        .map(|outputs| {
            outputs
                .iter()
                .filter_map(|out| out.get("value").and_then(|v| v.as_u64()))
                .sum()
        })
        .unwrap_or(0);
    StrippedTransaction {
        txid: tx.txid.clone(),
        fee: tx.fee.unwrap_or(0),
        vsize: tx.vsize,
        fee_per_vsize: tx.fee_per_vsize,
        value,
    }
}
