//! Account-trie healing worker.
//!
//! Healing converges a pivot's account trie by downloading the nodes its
//! state root still misses. The range-fetch path leaves the trie assembled
//! from fragments of different pivots, so nodes anywhere along a path may be
//! absent; each buddy tick re-checks what arrived meanwhile, inspects known
//! nodes for dangling children, fetches a bounded batch from its peer and
//! classifies what came back.
//!
//! A tick walks the following stations, yielding only at the network fetch:
//!
//! ```text
//!  IDLE ──gate──► UPDATE_MISSING ──► APPEND_DANGLING ──► DONE_CHECK
//!                     │                    │               │
//!                     ▼                    ▼               ▼
//!                  FETCH ◄───────── need-more ──────── COMPLETE
//!                     │
//!                     ▼
//!                  IMPORT ──► CLASSIFY ──► IDLE
//! ```
//!
//! Recoverable failures never escape a tick; they surface as re-queued work.
//! The only upward signal is the zombie flag on the buddy, set when its peer
//! became unusable.

use std::sync::Arc;

use bytes::Bytes;
use cinder_common::types::AccountState;
use cinder_rlp::decode::RLPDecode;
use cinder_trie::{EMPTY_TRIE_HASH, Node, NodeKind, NodeStore, inspect_trie};
use ethereum_types::{H256, U256};
use tracing::{debug, trace, warn};

use crate::{
    peer::{PeerErrorTally, PeerId, SnapPeer},
    snap::{
        NodeRequest, TrieNodeBatch, fetch_trie_nodes,
        constants::{HEAL_ACCOUNTS_TRIGGER, INSPECT_FRONTIER_LIMIT, MAX_TRIE_NODE_FETCH},
    },
    sync::{
        SyncError,
        pivot::{PivotEnv, SharedPivot},
        range_tracker::CoverageTracker,
    },
};

/// A per-peer healing worker bound to one pivot.
pub struct SnapBuddy {
    peer_id: PeerId,
    peer: Arc<dyn SnapPeer>,
    pivot: SharedPivot,
    coverage: CoverageTracker,
    store: NodeStore,
    tally: PeerErrorTally,
    zombie: bool,
}

impl SnapBuddy {
    pub fn new(
        peer_id: PeerId,
        peer: Arc<dyn SnapPeer>,
        pivot: SharedPivot,
        coverage: CoverageTracker,
        store: NodeStore,
    ) -> Self {
        Self {
            peer_id,
            peer,
            pivot,
            coverage,
            store,
            tally: PeerErrorTally::default(),
            zombie: false,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn pivot(&self) -> &SharedPivot {
        &self.pivot
    }

    /// A zombie buddy does no further work and should be detached.
    pub fn is_zombie(&self) -> bool {
        self.zombie
    }

    fn zombify(&mut self, reason: &str) {
        if !self.zombie {
            debug!(peer = %self.peer_id, reason, "Marking healing buddy zombie");
            self.zombie = true;
        }
    }
}

/// Runs one healing tick for the buddy. Idempotent once the pivot's account
/// trie is fully healed.
pub async fn heal_accounts_db(buddy: &mut SnapBuddy) -> Result<(), SyncError> {
    if buddy.zombie || buddy.pivot.is_stale() {
        return Ok(());
    }

    let state_root;
    // Gate, UPDATE_MISSING, APPEND_DANGLING and slice selection form one
    // critical region: no suspension until the fetch below.
    let slice: Vec<NodeRequest> = {
        let pivot = buddy.pivot.clone();
        let mut env = pivot.lock();
        state_root = env.state_root();
        if env.healed {
            return Ok(());
        }

        // Healing is kept late: below the coverage trigger the cheaper
        // range-fetch path is still doing the bulk of the work.
        if buddy.coverage.full_factor() < HEAL_ACCOUNTS_TRIGGER {
            trace!(peer = %buddy.peer_id, "Coverage below healing trigger");
            return Ok(());
        }
        // Nothing fetched for this pivot yet and no work scheduled: healing
        // a non-empty trie this early would only duplicate range fetches.
        if env.n_accounts == 0
            && env.missing_nodes.is_empty()
            && env.check_nodes.is_empty()
            && state_root != *EMPTY_TRIE_HASH
        {
            return Ok(());
        }

        update_missing_nodes(buddy, &mut env);

        // Inspect when there are nodes to check, or at the very start when
        // nothing is known missing yet.
        if !env.check_nodes.is_empty() || env.missing_nodes.is_empty() {
            env.dedup_check();
            let seeds = std::mem::take(&mut env.check_nodes);
            match inspect_trie(&buddy.store, state_root, &seeds, INSPECT_FRONTIER_LIMIT) {
                Ok(inspection) => {
                    env.missing_nodes
                        .extend(inspection.dangling.into_iter().map(NodeRequest::from));
                    env.check_nodes = inspection.remaining;
                }
                Err(err) => {
                    // All seeds count as still uninspected.
                    env.check_nodes = seeds;
                    drop(env);
                    debug!(peer = %buddy.peer_id, error = %err, "Trie inspection failed");
                    buddy.zombify("trie inspection failed");
                    return Ok(());
                }
            }
        }

        // COMPLETE: nothing left to fetch, the account trie converged.
        if env.missing_nodes.is_empty() {
            env.healed = true;
            debug!(
                peer = %buddy.peer_id,
                pivot = env.state_header.number,
                accounts = env.n_accounts,
                "Account trie healing complete",
            );
            return Ok(());
        }

        // Take a suffix of the queue so concurrent buddies keep the rest.
        let start = env.missing_nodes.len().saturating_sub(MAX_TRIE_NODE_FETCH);
        env.missing_nodes.split_off(start)
    };

    // Suspension point: other buddies may mutate the pivot while we wait.
    let fetched = fetch_trie_nodes(buddy.peer.as_ref(), state_root, &slice).await;

    if buddy.pivot.is_stale() {
        // Pivot switched mid-flight; put the slice back for completeness and
        // let the buddy terminate.
        buddy.pivot.lock().missing_nodes.extend(slice);
        return Ok(());
    }

    let mut batch = match fetched {
        Err(kind) => {
            debug!(peer = %buddy.peer_id, error = %kind, "Trie node fetch failed");
            buddy.pivot.lock().missing_nodes.extend(slice);
            if buddy.tally.register(&buddy.peer_id, kind) {
                buddy.zombify("peer error threshold crossed");
            }
            return Ok(());
        }
        Ok(batch) => {
            buddy.tally.record_success();
            batch
        }
    };

    let left_over = std::mem::take(&mut batch.left_over);
    if !left_over.is_empty() {
        buddy.pivot.lock().missing_nodes.extend(left_over);
    }

    import_and_classify(buddy, batch)
}

/// UPDATE_MISSING: nodes another buddy or the range-fetch path persisted in
/// the meantime move over to the check queue for child inspection.
fn update_missing_nodes(buddy: &SnapBuddy, env: &mut PivotEnv) {
    env.dedup_missing();
    let mut still_missing = Vec::with_capacity(env.missing_nodes.len());
    for request in std::mem::take(&mut env.missing_nodes) {
        match buddy.store.contains(request.hash) {
            Ok(true) => env.check_nodes.push(request.path),
            Ok(false) => still_missing.push(request),
            Err(err) => {
                // Treat unreadable as still missing and retry later.
                debug!(error = %err, "Node presence check failed");
                still_missing.push(request);
            }
        }
    }
    env.missing_nodes = still_missing;
}

/// IMPORT and CLASSIFY: persist the fetched blobs, then route every report
/// entry back onto the pivot's work lists.
fn import_and_classify(buddy: &mut SnapBuddy, batch: TrieNodeBatch) -> Result<(), SyncError> {
    let blobs: Vec<(H256, Bytes)> = batch
        .answered
        .iter()
        .map(|(request, blob)| (request.hash, blob.clone()))
        .collect();
    let reports = buddy.store.import_raw(&blobs);

    // A trailing slot-less entry is a storage failure: nothing past it was
    // written, so the whole batch goes back on the queue for the next tick.
    if reports.iter().any(|report| report.slot.is_none()) {
        warn!(peer = %buddy.peer_id, "Storage failure while importing healed nodes, requeueing batch");
        let mut env = buddy.pivot.lock();
        env.missing_nodes
            .extend(batch.answered.into_iter().map(|(request, _)| request));
        return Ok(());
    }

    let pivot = buddy.pivot.clone();
    let mut env = pivot.lock();
    for report in reports {
        let Some(slot) = report.slot else {
            continue;
        };
        let (request, blob) = &batch.answered[slot];
        if report.error.is_some() {
            env.missing_nodes.push(request.clone());
            continue;
        }
        match report.kind {
            // The empty-trie marker has nothing beneath it.
            None => {}
            Some(NodeKind::Branch | NodeKind::Extension) => {
                env.check_nodes.push(request.path.clone());
            }
            Some(NodeKind::Leaf) => classify_leaf(buddy, &mut env, request, blob),
        }
    }
    Ok(())
}

/// Routes a freshly imported leaf: a full-depth path is an account to record,
/// anything shorter is a positional artifact that needs further inspection.
fn classify_leaf(buddy: &SnapBuddy, env: &mut PivotEnv, request: &NodeRequest, blob: &Bytes) {
    let leaf = match Node::decode_raw(blob) {
        Ok(Node::Leaf(leaf)) => leaf,
        // The import reported a leaf; anything else here means the blob
        // raced away from under us, so schedule it again.
        _ => {
            env.missing_nodes.push(request.clone());
            return;
        }
    };

    let full_path = request.path.concat(&leaf.partial);
    // Account keys are 32 bytes: 64 nibbles plus the terminator.
    if !(full_path.is_leaf() && full_path.len() == 65) {
        env.check_nodes.push(request.path.clone());
        return;
    }

    let account_hash = H256::from_slice(&full_path.to_bytes());
    let account = match AccountState::decode(&leaf.value) {
        Ok(account) => account,
        Err(err) => {
            debug!(peer = %buddy.peer_id, account = %account_hash, error = %err, "Dropping leaf with undecodable account");
            return;
        }
    };

    let tag = U256::from_big_endian(account_hash.as_bytes());
    let Some(range_set) = env.unprocessed.iter_mut().find(|set| set.contains(tag)) else {
        // Another path already processed this account.
        trace!(account = %account_hash, "Healed account already covered, dropping");
        return;
    };
    range_set.reduce(tag, tag);
    buddy.coverage.merge(tag, tag);
    env.n_accounts += 1;
    if account.has_storage() {
        env.queue_storage_heal(account_hash, account.storage_root);
    }
}
