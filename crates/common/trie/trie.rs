//! Hexary Merkle Patricia Trie primitives for snap sync.
//!
//! Nodes are content-addressed: every node is stored in a flat map keyed by
//! the Keccak256 hash of its RLP encoding, so the trie is a DAG of hash
//! references rather than pointers. The [`NodeStore`] gives healing read,
//! batched-import and structural-inspection access over any [`TrieDB`].

pub mod db;
pub mod error;
mod inspect;
mod nibbles;
mod node;
mod node_hash;
mod store;

use cinder_rlp::constants::RLP_NULL;
use ethereum_types::H256;
use lazy_static::lazy_static;
use sha3::{Digest, Keccak256};

pub use self::db::{InMemoryTrieDB, TrieDB};
pub use self::error::TrieError;
pub use self::inspect::{ChildLink, TrieInspection, inspect_trie};
pub use self::nibbles::{Nibbles, hex_prefix_decode};
pub use self::node::{BranchNode, ExtensionNode, LeafNode, Node, NodeKind};
pub use self::node_hash::NodeHash;
pub use self::store::{ImportError, ImportReport, NodeStore, PathLookup};

lazy_static! {
    // Hash value for an empty trie, equal to keccak(RLP_NULL)
    pub static ref EMPTY_TRIE_HASH: H256 = H256::from_slice(
        Keccak256::new()
            .chain_update([RLP_NULL])
            .finalize()
            .as_slice(),
    );
}
