use crate::TokenError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MAX_MEMO_BYTES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Account that owns the ledger and may register new symbols.
    pub authority: Uuid,
    #[serde(default = "default_max_memo_bytes")]
    pub max_memo_bytes: usize,
}

fn default_max_memo_bytes() -> usize {
    DEFAULT_MAX_MEMO_BYTES
}

impl LedgerConfig {
    pub fn new(authority: Uuid) -> Self {
        Self {
            authority,
            max_memo_bytes: DEFAULT_MAX_MEMO_BYTES,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, TokenError> {
        serde_json::from_str(raw).map_err(|e| TokenError::Config(e.to_string()))
    }
}
