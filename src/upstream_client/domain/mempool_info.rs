use serde::{Deserialize, Serialize};

/// The upstream's self-reported pool summary, replaced atomically on each
/// refresh. Independent of the mirrored cache.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MempoolInfo {
    pub size: u64,
    pub bytes: u64,
}
