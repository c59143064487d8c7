use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::{MAX_RANK, MAX_TOKENS_PER_NAME};
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Names splitting into more tokens are truncated (with a warning).
    pub max_tokens_per_name: usize,
    /// Ranks above this are clamped before encoding.
    pub max_rank: u8,
    /// Where the forward-order scratch file lives; defaults to the container's directory.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_name: MAX_TOKENS_PER_NAME,
            max_rank: MAX_RANK,
            scratch_dir: None,
        }
    }
}

impl IndexConfig {
    /// Reads a JSON config; absent keys take their defaults, an absent file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&s)?)
    }
}
