use async_trait::async_trait;
use ethereum_types::H256;
use tracing::debug;

use crate::snap::{
    GetTrieNodes, NetworkErrorKind, TrieNodes,
    constants::{MAX_CONSECUTIVE_TIMEOUTS, MAX_SERIOUS_FAULTS},
};

/// Peers are identified by their node id.
pub type PeerId = H256;

/// Transport seam towards a remote peer speaking the snap capability.
/// Implementations own connection handling and the wire codec; the healing
/// engine only sees decoded messages and classified errors.
#[async_trait]
pub trait SnapPeer: Send + Sync {
    async fn request_trie_nodes(&self, request: GetTrieNodes)
    -> Result<TrieNodes, NetworkErrorKind>;
}

/// Per-buddy accumulator of peer failures.
///
/// A successful response clears the timeout streak but not the serious-fault
/// count: a peer that alternates good replies with protocol violations stays
/// on its way out.
#[derive(Debug, Default)]
pub struct PeerErrorTally {
    consecutive_timeouts: u32,
    serious_faults: u32,
}

impl PeerErrorTally {
    /// Records a failed request. Returns true once the peer crossed a
    /// threshold and must be zombified.
    pub fn register(&mut self, peer_id: &PeerId, kind: NetworkErrorKind) -> bool {
        match kind {
            NetworkErrorKind::Timeout => {
                self.consecutive_timeouts += 1;
                if self.consecutive_timeouts >= MAX_CONSECUTIVE_TIMEOUTS {
                    debug!(peer = %peer_id, timeouts = self.consecutive_timeouts, "Peer keeps timing out");
                    return true;
                }
            }
            kind if kind.is_serious() => {
                self.serious_faults += 1;
                if self.serious_faults >= MAX_SERIOUS_FAULTS {
                    debug!(peer = %peer_id, faults = self.serious_faults, %kind, "Peer misbehaving");
                    return true;
                }
            }
            // Empty responses are transient, the peer may simply not have the
            // data yet.
            _ => {}
        }
        false
    }

    /// Records a useful response from the peer.
    pub fn record_success(&mut self) {
        self.consecutive_timeouts = 0;
    }
}
