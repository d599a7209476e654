//! Sync module - snap-sync healing orchestration.
//!
//! Hosts the pivot work-state, the interval bookkeeping over the account key
//! space, the per-buddy healing worker and the coordinator/ticker that owns
//! buddy lifecycle.

pub mod pivot;
pub mod range_tracker;
pub mod state_healing;
pub mod ticker;

use cinder_common::types::{BlockBody, BlockHeader};
use cinder_rlp::error::RLPDecodeError;
use cinder_trie::TrieError;
use thiserror::Error;

use crate::snap::NetworkErrorKind;

/// Chain database surface the healing engine consumes. Block import and
/// storage backends live elsewhere.
pub trait ChainSource: Send + Sync {
    /// Returns the header of the current canonical chain head.
    fn canonical_head(&self) -> Result<BlockHeader, SyncError>;

    /// Persists a batch of downloaded blocks.
    fn persist_blocks(
        &self,
        headers: Vec<BlockHeader>,
        bodies: Vec<BlockBody>,
    ) -> Result<(), SyncError>;
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Trie(#[from] TrieError),
    #[error(transparent)]
    Rlp(#[from] RLPDecodeError),
    #[error("Network error: {0}")]
    Network(NetworkErrorKind),
    #[error("Chain source error: {0}")]
    Chain(String),
}
