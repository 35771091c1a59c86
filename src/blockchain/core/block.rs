use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const GENESIS_HASH: &str = "36da6afc3a921823786534932c2b715487d4c14378abed4f8167695e6337db87";
pub const GENESIS_TIMESTAMP: u64 = 1614415803000;
pub const GENESIS_DATA: &str = "The Genesis Block!";

/// A single ledger entry. Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub hash: String,
    pub previous_hash: Option<String>,
    pub timestamp: u64,
    pub data: String,
}

/// SHA-256 over `index ++ previous_hash ++ timestamp ++ data`, hex encoded.
///
/// Numbers are rendered in decimal and a missing previous hash as `null`, so
/// every node derives the same digest from the same fields.
pub fn calculate_hash(index: u64, previous_hash: Option<&str>, timestamp: u64, data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string().as_bytes());
    hasher.update(previous_hash.unwrap_or("null").as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

impl Block {
    /// Builds a block whose hash is derived from the other fields.
    pub fn new(index: u64, previous_hash: Option<String>, timestamp: u64, data: String) -> Self {
        let hash = calculate_hash(index, previous_hash.as_deref(), timestamp, &data);
        Block {
            index,
            hash,
            previous_hash,
            timestamp,
            data,
        }
    }

    /// The hardcoded first block shared by every node.
    pub fn genesis() -> Self {
        Block {
            index: 0,
            hash: GENESIS_HASH.to_string(),
            previous_hash: None,
            timestamp: GENESIS_TIMESTAMP,
            data: GENESIS_DATA.to_string(),
        }
    }

    /// Field-by-field comparison against the genesis constant.
    pub fn is_genesis(&self) -> bool {
        self.index == 0
            && self.hash == GENESIS_HASH
            && self.previous_hash.is_none()
            && self.timestamp == GENESIS_TIMESTAMP
            && self.data == GENESIS_DATA
    }

    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            self.index,
            self.previous_hash.as_deref(),
            self.timestamp,
            &self.data,
        )
    }

    /// First characters of the hash, for log lines and tables.
    pub fn short_hash(&self) -> &str {
        self.hash.get(..12).unwrap_or(&self.hash)
    }
}
