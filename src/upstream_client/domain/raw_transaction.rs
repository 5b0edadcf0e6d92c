use serde::{Deserialize, Serialize};

/// A pending transaction as the upstream node reports it. Only the fields
/// the engine derives from are typed; everything else rides along in `rest`
/// and is handed to consumers untouched.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    pub weight: u64,
    pub fee: Option<u64>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}
