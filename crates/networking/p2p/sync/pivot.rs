//! Per-pivot healing work-state.
//!
//! A [`PivotEnv`] is created when a new pivot block is adopted and abandoned
//! on the next pivot switch. All mutation goes through buddies holding the
//! [`SharedPivot`] handle; lock scopes are the critical regions of the
//! cooperative model and must never be held across a suspension point.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, atomic::{AtomicBool, Ordering}};

use cinder_common::types::BlockHeader;
use cinder_trie::Nibbles;
use ethereum_types::H256;

use crate::snap::NodeRequest;
use crate::sync::range_tracker::TagRangeSet;

/// A storage trie scheduled for healing once account healing is done:
/// the owning account's hashed address and the storage root its state
/// commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHealRequest {
    pub account_hash: H256,
    pub storage_root: H256,
}

/// Mutable work-state of one pivot.
#[derive(Debug)]
pub struct PivotEnv {
    /// Header of the pivot block; its state root is the trie being healed.
    pub state_header: BlockHeader,
    /// Nodes believed absent locally, waiting to be fetched.
    pub missing_nodes: Vec<NodeRequest>,
    /// Nodes present locally whose children must be inspected.
    pub check_nodes: Vec<Nibbles>,
    /// Account key ranges not yet covered by range-fetch or healing.
    pub unprocessed: Vec<TagRangeSet>,
    /// Storage tries discovered on healed account leaves.
    pub fetch_storage: Vec<StorageHealRequest>,
    /// Accounts processed under this pivot.
    pub n_accounts: u64,
    /// Set once the account trie converged; further ticks are no-ops.
    pub healed: bool,
}

impl PivotEnv {
    /// Builds the work-state for a freshly adopted pivot: the state root is
    /// the first missing node and the whole key space is unprocessed.
    pub fn new(state_header: BlockHeader) -> Self {
        let root_request = NodeRequest {
            hash: state_header.state_root,
            path: Nibbles::default(),
        };
        Self {
            state_header,
            missing_nodes: vec![root_request],
            check_nodes: Vec::new(),
            unprocessed: vec![TagRangeSet::full_range()],
            fetch_storage: Vec::new(),
            n_accounts: 0,
            healed: false,
        }
    }

    pub fn state_root(&self) -> H256 {
        self.state_header.state_root
    }

    /// Drops duplicate entries from the missing queue, keeping first
    /// occurrences. Duplicates are tolerated transiently between commits but
    /// must not reach a fetch.
    pub fn dedup_missing(&mut self) {
        let mut seen = HashSet::with_capacity(self.missing_nodes.len());
        self.missing_nodes
            .retain(|request| seen.insert(request.path.clone()));
    }

    /// Same as [`dedup_missing`](Self::dedup_missing) for the check queue.
    pub fn dedup_check(&mut self) {
        let mut seen = HashSet::with_capacity(self.check_nodes.len());
        self.check_nodes.retain(|path| seen.insert(path.clone()));
    }

    /// Records a storage trie to heal later, once per account.
    pub fn queue_storage_heal(&mut self, account_hash: H256, storage_root: H256) {
        let request = StorageHealRequest {
            account_hash,
            storage_root,
        };
        if !self.fetch_storage.contains(&request) {
            self.fetch_storage.push(request);
        }
    }
}

/// Cloneable handle to a pivot's work-state.
///
/// A pivot switch marks the old handle stale; buddies observe that at their
/// next scheduling point and terminate instead of touching the abandoned
/// state.
#[derive(Clone)]
pub struct SharedPivot {
    inner: Arc<Mutex<PivotEnv>>,
    stale: Arc<AtomicBool>,
}

impl SharedPivot {
    pub fn new(env: PivotEnv) -> Self {
        Self {
            inner: Arc::new(Mutex::new(env)),
            stale: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enters the critical region. The guard must be dropped before any
    /// suspension point.
    pub fn lock(&self) -> MutexGuard<'_, PivotEnv> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Relaxed);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }

    pub fn is_healed(&self) -> bool {
        self.lock().healed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pivot_header(root: H256) -> BlockHeader {
        BlockHeader {
            state_root: root,
            number: 1,
            ..Default::default()
        }
    }

    #[test]
    fn new_pivot_is_seeded_with_the_root() {
        let root = H256::repeat_byte(0xaa);
        let env = PivotEnv::new(pivot_header(root));
        assert_eq!(env.missing_nodes.len(), 1);
        assert_eq!(env.missing_nodes[0].hash, root);
        assert!(env.missing_nodes[0].path.is_empty());
        assert_eq!(env.unprocessed.len(), 1);
        assert_eq!(env.unprocessed[0].full_factor(), 1.0);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut env = PivotEnv::new(pivot_header(H256::repeat_byte(0xaa)));
        let request = NodeRequest {
            hash: H256::repeat_byte(0xbb),
            path: Nibbles::from_hex(vec![1, 2]),
        };
        env.missing_nodes.push(request.clone());
        env.missing_nodes.push(request.clone());
        env.dedup_missing();
        assert_eq!(env.missing_nodes.len(), 2); // root + one copy
    }

    #[test]
    fn storage_heals_are_recorded_once() {
        let mut env = PivotEnv::new(pivot_header(H256::repeat_byte(0xaa)));
        let account = H256::repeat_byte(0x01);
        let root = H256::repeat_byte(0x02);
        env.queue_storage_heal(account, root);
        env.queue_storage_heal(account, root);
        assert_eq!(env.fetch_storage.len(), 1);
    }

    #[test]
    fn stale_flag_is_shared_between_handles() {
        let pivot = SharedPivot::new(PivotEnv::new(pivot_header(H256::repeat_byte(0xaa))));
        let clone = pivot.clone();
        assert!(!clone.is_stale());
        pivot.mark_stale();
        assert!(clone.is_stale());
    }
}
