use bytes::Bytes;
use cinder_trie::{ChildLink, Nibbles, NodeHash};
use ethereum_types::H256;
use tracing::debug;

use crate::{
    peer::SnapPeer,
    snap::{
        GetTrieNodes, NetworkErrorKind,
        constants::{MAX_RESPONSE_BYTES, MAX_TRIE_NODE_FETCH, PEER_REPLY_TIMEOUT},
    },
};

/// A scheduled node download: the path the node sits at under the pivot root
/// and the hash its parent commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRequest {
    pub hash: H256,
    pub path: Nibbles,
}

impl From<ChildLink> for NodeRequest {
    fn from(link: ChildLink) -> Self {
        Self {
            hash: link.hash,
            path: link.path,
        }
    }
}

/// Outcome of a successful trie-node fetch. A peer may answer a prefix of the
/// requested batch; whatever it skipped comes back verbatim in `left_over`.
#[derive(Debug)]
pub struct TrieNodeBatch {
    pub answered: Vec<(NodeRequest, Bytes)>,
    pub left_over: Vec<NodeRequest>,
}

/// Requests a batch of account-trie nodes from a peer.
///
/// The batch is capped at [`MAX_TRIE_NODE_FETCH`]; callers slice their queue
/// accordingly. Every returned blob is verified against the hash it was
/// requested under, a single mismatch discards the whole response.
pub async fn fetch_trie_nodes(
    peer: &dyn SnapPeer,
    state_root: H256,
    requests: &[NodeRequest],
) -> Result<TrieNodeBatch, NetworkErrorKind> {
    let requests = &requests[..requests.len().min(MAX_TRIE_NODE_FETCH)];
    let request_id: u64 = rand::random();
    let request = GetTrieNodes {
        id: request_id,
        root_hash: state_root,
        // [acc_path, acc_path,...] -> [[acc_path], [acc_path]]
        paths: requests
            .iter()
            .map(|request| vec![Bytes::from(request.path.encode_compact())])
            .collect(),
        bytes: MAX_RESPONSE_BYTES,
    };

    let response = match tokio::time::timeout(PEER_REPLY_TIMEOUT, peer.request_trie_nodes(request))
        .await
    {
        Ok(result) => result?,
        Err(_) => return Err(NetworkErrorKind::Timeout),
    };

    if response.id != request_id {
        return Err(NetworkErrorKind::ProtocolViolation);
    }
    if response.nodes.is_empty() {
        return Err(NetworkErrorKind::Empty);
    }
    if response.nodes.len() > requests.len() {
        return Err(NetworkErrorKind::ProtocolViolation);
    }

    for (node, request) in response.nodes.iter().zip(requests.iter()) {
        if NodeHash::from_encoded(node).finalize() != request.hash {
            debug!(path = ?request.path, "Peer sent wrong data for a state trie node");
            return Err(NetworkErrorKind::WrongHash);
        }
    }

    let answered = requests
        .iter()
        .cloned()
        .zip(response.nodes.iter())
        .map(|(request, node)| (request, node.clone()))
        .collect();
    let left_over = requests[response.nodes.len()..].to_vec();

    Ok(TrieNodeBatch {
        answered,
        left_over,
    })
}
