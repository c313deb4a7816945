//! Store-level options.

use serde::{Deserialize, Serialize};

/// Default number of predecessor tokens resolved when loading an access token.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 16;

/// Options shared by every component store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// How many predecessors an access token load follows before giving up.
    /// Zero disables chain resolution.
    pub max_chain_depth: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

impl StoreOptions {
    /// Sets the rotation chain depth.
    #[must_use]
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }
}
