use std::sync::Arc;

use bytes::Bytes;
use cinder_rlp::{constants::RLP_NULL, error::RLPDecodeError};
use ethereum_types::H256;
use thiserror::Error;

use crate::{
    EMPTY_TRIE_HASH,
    db::{InMemoryTrieDB, TrieDB},
    error::TrieError,
    nibbles::Nibbles,
    node::{Node, NodeKind},
    node_hash::{NodeHash, keccak},
};

/// Result of walking a trie towards a node path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathLookup {
    /// Every intermediate node exists; this is the reference reached at the
    /// end of the path. The referenced node itself may still be absent.
    Present(NodeHash),
    /// The walk hit a missing node or the path does not exist under this root.
    Missing,
}

/// Per-blob outcome of a batched import.
///
/// `slot` indexes the blob the entry refers to; an entry without a slot
/// signals a storage-layer failure and only appears trailing, after which no
/// further blobs were imported.
#[derive(Debug)]
pub struct ImportReport {
    pub slot: Option<usize>,
    pub kind: Option<NodeKind>,
    pub error: Option<ImportError>,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Parse(RLPDecodeError),
    #[error("Node hash does not match the requested node")]
    HashMismatch,
    #[error(transparent)]
    Storage(TrieError),
}

/// Content-addressed node store backing the healing engine: a flat hash-to-rlp
/// map with read, batched-insert and walk access. Entries are write-once since
/// a key commits to its content.
#[derive(Clone)]
pub struct NodeStore {
    db: Arc<dyn TrieDB>,
}

impl NodeStore {
    pub fn new(db: Arc<dyn TrieDB>) -> Self {
        Self { db }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTrieDB::new_empty()))
    }

    /// Returns true if the node with the given hash has been persisted.
    pub fn contains(&self, hash: H256) -> Result<bool, TrieError> {
        Ok(self.db.get(hash.as_bytes().to_vec())?.is_some())
    }

    /// Returns true if the referenced node is available: embedded nodes
    /// always are.
    pub fn contains_ref(&self, node_ref: &NodeHash) -> Result<bool, TrieError> {
        match node_ref {
            NodeHash::Hashed(hash) => self.contains(*hash),
            NodeHash::Inline(_, _) => Ok(true),
        }
    }

    /// Loads and decodes the referenced node. The empty trie has no nodes.
    pub fn get_node(&self, node_ref: &NodeHash) -> Result<Option<Node>, TrieError> {
        if let Some(rlp) = node_ref.as_inline() {
            return Ok(Some(Node::decode_raw(rlp)?));
        }
        let hash = node_ref.finalize();
        if hash == *EMPTY_TRIE_HASH {
            return Ok(None);
        }
        self.db
            .get(hash.as_bytes().to_vec())?
            .map(|rlp| Node::decode_raw(&rlp).map_err(TrieError::RLPDecode))
            .transpose()
    }

    /// Walks from `root` along `path`, returning the node reference reached
    /// when every intermediate node exists locally.
    pub fn get_by_path(&self, root: H256, path: &Nibbles) -> Result<PathLookup, TrieError> {
        let mut current: NodeHash = root.into();
        let mut remaining = path.clone();
        loop {
            if remaining.is_empty() {
                return Ok(PathLookup::Present(current));
            }
            let Some(node) = self.get_node(&current)? else {
                return Ok(PathLookup::Missing);
            };
            match node {
                Node::Branch(branch) => {
                    let Some(choice) = remaining.next_choice() else {
                        return Ok(PathLookup::Missing);
                    };
                    let child = branch.choices[choice];
                    if !child.is_valid() {
                        return Ok(PathLookup::Missing);
                    }
                    current = child;
                }
                Node::Extension(extension) => {
                    if !remaining.skip_prefix(&extension.prefix) || !extension.child.is_valid() {
                        return Ok(PathLookup::Missing);
                    }
                    current = extension.child;
                }
                // The path continues past a terminating node
                Node::Leaf(_) => return Ok(PathLookup::Missing),
            }
        }
    }

    /// Batched insert of opaque RLP-encoded nodes, paired with the hash each
    /// blob was requested under.
    ///
    /// Imports are atomic per blob. Malformed blobs and hash mismatches are
    /// dropped and marked in their report entry; a storage failure aborts the
    /// rest of the batch with a trailing slot-less entry.
    pub fn import_raw(&self, blobs: &[(H256, Bytes)]) -> Vec<ImportReport> {
        let mut reports = Vec::with_capacity(blobs.len());
        for (slot, (expected, blob)) in blobs.iter().enumerate() {
            let hash = keccak(blob);
            if hash != *expected {
                reports.push(ImportReport {
                    slot: Some(slot),
                    kind: None,
                    error: Some(ImportError::HashMismatch),
                });
                continue;
            }
            // The empty-trie marker has no node structure to decode.
            let kind = if blob.as_ref() == [RLP_NULL] {
                None
            } else {
                match Node::decode_raw(blob) {
                    Ok(node) => Some(node.kind()),
                    Err(err) => {
                        reports.push(ImportReport {
                            slot: Some(slot),
                            kind: None,
                            error: Some(ImportError::Parse(err)),
                        });
                        continue;
                    }
                }
            };
            if let Err(err) = self.put_once(hash, blob) {
                reports.push(ImportReport {
                    slot: None,
                    kind: None,
                    error: Some(ImportError::Storage(err)),
                });
                break;
            }
            reports.push(ImportReport {
                slot: Some(slot),
                kind,
                error: None,
            });
        }
        reports
    }

    fn put_once(&self, hash: H256, blob: &Bytes) -> Result<(), TrieError> {
        let key = hash.as_bytes().to_vec();
        if self.db.get(key.clone())?.is_some() {
            return Ok(());
        }
        self.db.put(key, blob.to_vec())
    }
}
