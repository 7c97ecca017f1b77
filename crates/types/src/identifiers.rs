//! Shard and nonce identifier types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Shard identifier.
///
/// One reserved value, [`Shard::METACHAIN`], denotes the coordinating
/// metachain, distinct from the ordinary numbered shards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shard(pub u32);

impl Shard {
    /// Reserved identifier of the coordinating metachain.
    pub const METACHAIN: Self = Shard(u32::MAX);

    /// Whether this is the metachain.
    pub fn is_metachain(&self) -> bool {
        *self == Self::METACHAIN
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_metachain() {
            write!(f, "Metachain")
        } else {
            write!(f, "Shard {}", self.0)
        }
    }
}

/// Block height within one shard's chain.
///
/// Nonces are only ever compared within the same shard's sequence; two
/// nonces from different shards are never semantically comparable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Nonce(pub u64);

impl Nonce {
    /// The next block height.
    pub fn next(self) -> Self {
        Nonce(self.0 + 1)
    }

    /// The previous block height, floored at zero.
    pub fn prev(self) -> Self {
        Nonce(self.0.saturating_sub(1))
    }

    /// Subtract `n` heights, floored at zero.
    pub fn saturating_sub(self, n: u64) -> Self {
        Nonce(self.0.saturating_sub(n))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-shard nonce mapping.
pub type NonceByShard = HashMap<Shard, Nonce>;
