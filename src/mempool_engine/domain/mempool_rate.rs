use serde::{Deserialize, Serialize};

/// Smoothed arrival rates over the configured window, recomputed by the
/// once-per-second tick.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolRate {
    pub tx_per_second: f64,
    #[serde(rename = "vBytesPerSecond")]
    pub vbytes_per_second: u64,
}
