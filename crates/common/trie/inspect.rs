use std::collections::{HashSet, VecDeque};

use ethereum_types::H256;

use crate::{
    EMPTY_TRIE_HASH,
    error::TrieError,
    nibbles::Nibbles,
    node::Node,
    node_hash::NodeHash,
    store::{NodeStore, PathLookup},
};

/// A child reference whose target node is not available locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLink {
    pub path: Nibbles,
    pub hash: H256,
}

/// Outcome of a bounded inspection pass.
#[derive(Debug, Default)]
pub struct TrieInspection {
    /// Child paths whose referenced node is absent locally.
    pub dangling: Vec<ChildLink>,
    /// Paths that already terminate at a leaf (including branch value slots,
    /// reported under the 16 nibble).
    pub leaves: Vec<Nibbles>,
    /// Node paths left uninspected because the frontier bound was reached.
    pub remaining: Vec<Nibbles>,
}

/// Inspects the subtrees under the seed paths, collecting references to
/// missing nodes.
///
/// Every seed present under `root` is expanded breadth-first: children of a
/// branch are visited in nibble order 0..=15 followed by the value slot, an
/// extension contributes the single path extended by its prefix. Expansion
/// stops after `frontier_limit` nodes so one call cannot monopolize a worker;
/// whatever was not reached is handed back in `remaining`.
///
/// Without seeds the inspection starts from the root itself.
///
/// A malformed node fails the whole call and the caller must treat every
/// seed as still uninspected.
pub fn inspect_trie(
    store: &NodeStore,
    root: H256,
    seeds: &[Nibbles],
    frontier_limit: usize,
) -> Result<TrieInspection, TrieError> {
    let mut inspection = TrieInspection::default();
    // The empty trie has nothing beneath it.
    if root == *EMPTY_TRIE_HASH {
        return Ok(inspection);
    }

    let mut queue: VecDeque<(Nibbles, NodeHash)> = VecDeque::new();
    let mut enqueued: HashSet<Nibbles> = HashSet::new();

    let root_seed = [Nibbles::default()];
    let seeds: &[Nibbles] = if seeds.is_empty() { &root_seed } else { seeds };
    for seed in seeds {
        if !enqueued.insert(seed.clone()) {
            continue;
        }
        match store.get_by_path(root, seed)? {
            // The path no longer exists under this root, skip it.
            PathLookup::Missing => continue,
            PathLookup::Present(node_ref) => {
                if store.contains_ref(&node_ref)? {
                    queue.push_back((seed.clone(), node_ref));
                } else {
                    inspection.dangling.push(ChildLink {
                        path: seed.clone(),
                        hash: node_ref.finalize(),
                    });
                }
            }
        }
    }

    let mut expanded = 0usize;
    while let Some((path, node_ref)) = queue.pop_front() {
        if expanded >= frontier_limit {
            inspection.remaining.push(path);
            inspection
                .remaining
                .extend(std::mem::take(&mut queue).into_iter().map(|(path, _)| path));
            break;
        }
        let Some(node) = store.get_node(&node_ref)? else {
            // Raced away since the presence check; report it missing.
            inspection.dangling.push(ChildLink {
                path,
                hash: node_ref.finalize(),
            });
            continue;
        };
        expanded += 1;

        match node {
            Node::Leaf(_) => inspection.leaves.push(path),
            Node::Branch(branch) => {
                for (choice, child) in branch.choices.iter().enumerate() {
                    if !child.is_valid() {
                        continue;
                    }
                    let child_path = path.append_new(choice as u8);
                    visit_child(store, child_path, *child, &mut queue, &mut enqueued, &mut inspection)?;
                }
                if !branch.value.is_empty() {
                    inspection.leaves.push(path.append_new(16));
                }
            }
            Node::Extension(extension) => {
                if extension.child.is_valid() {
                    let child_path = path.concat(&extension.prefix);
                    visit_child(
                        store,
                        child_path,
                        extension.child,
                        &mut queue,
                        &mut enqueued,
                        &mut inspection,
                    )?;
                }
            }
        }
    }

    Ok(inspection)
}

fn visit_child(
    store: &NodeStore,
    path: Nibbles,
    child: NodeHash,
    queue: &mut VecDeque<(Nibbles, NodeHash)>,
    enqueued: &mut HashSet<Nibbles>,
    inspection: &mut TrieInspection,
) -> Result<(), TrieError> {
    if !enqueued.insert(path.clone()) {
        return Ok(());
    }
    if store.contains_ref(&child)? {
        queue.push_back((path, child));
    } else {
        inspection.dangling.push(ChildLink {
            path,
            hash: child.finalize(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BranchNode, ExtensionNode, LeafNode};
    use bytes::Bytes;

    fn import(store: &NodeStore, node: &Node) -> H256 {
        let blob = Bytes::from(node.encode_raw());
        let hash = node.compute_hash().finalize();
        let reports = store.import_raw(&[(hash, blob)]);
        assert!(reports[0].error.is_none());
        hash
    }

    fn long_leaf(partial: Vec<u8>) -> Node {
        LeafNode {
            partial: {
                let mut hex = partial;
                hex.push(16);
                Nibbles::from_hex(hex)
            },
            value: b"a-value-long-enough-to-force-hashing".to_vec(),
        }
        .into()
    }

    #[test]
    fn empty_root_has_nothing_dangling() {
        let store = NodeStore::in_memory();
        let inspection = inspect_trie(&store, *EMPTY_TRIE_HASH, &[], 100).unwrap();
        assert!(inspection.dangling.is_empty());
        assert!(inspection.leaves.is_empty());
    }

    #[test]
    fn missing_root_is_dangling() {
        let store = NodeStore::in_memory();
        let root = H256::repeat_byte(0x42);
        let inspection = inspect_trie(&store, root, &[], 100).unwrap();
        assert_eq!(
            inspection.dangling,
            vec![ChildLink {
                path: Nibbles::default(),
                hash: root
            }]
        );
    }

    #[test]
    fn branch_with_absent_child_reports_exactly_it() {
        // Branch with slots 3 and 5 occupied; the child under nibble 3 was
        // never stored.
        let store = NodeStore::in_memory();
        let present = long_leaf(vec![0x1]);
        let present_hash = import(&store, &present);
        let absent_hash = long_leaf(vec![0x2]).compute_hash().finalize();

        let mut choices: [NodeHash; 16] = Default::default();
        choices[3] = NodeHash::Hashed(absent_hash);
        choices[5] = NodeHash::Hashed(present_hash);
        let branch: Node = BranchNode {
            choices,
            value: vec![],
        }
        .into();
        let root = import(&store, &branch);

        let inspection = inspect_trie(&store, root, &[Nibbles::default()], 100).unwrap();
        assert_eq!(
            inspection.dangling,
            vec![ChildLink {
                path: Nibbles::from_hex(vec![3]),
                hash: absent_hash
            }]
        );
        // The present child was reached and classified as a leaf
        assert_eq!(inspection.leaves, vec![Nibbles::from_hex(vec![5])]);
    }

    #[test]
    fn extension_extends_the_dangling_path() {
        let store = NodeStore::in_memory();
        let absent_hash = H256::repeat_byte(0x99);
        let extension: Node = ExtensionNode {
            prefix: Nibbles::from_hex(vec![0xa, 0xb]),
            child: NodeHash::Hashed(absent_hash),
        }
        .into();
        let root = import(&store, &extension);

        let inspection = inspect_trie(&store, root, &[], 100).unwrap();
        assert_eq!(
            inspection.dangling,
            vec![ChildLink {
                path: Nibbles::from_hex(vec![0xa, 0xb]),
                hash: absent_hash
            }]
        );
    }

    #[test]
    fn frontier_limit_hands_back_unvisited_paths() {
        let store = NodeStore::in_memory();
        let left = long_leaf(vec![0x1]);
        let left_hash = import(&store, &left);
        let right = long_leaf(vec![0x2]);
        let right_hash = import(&store, &right);

        let mut choices: [NodeHash; 16] = Default::default();
        choices[0] = NodeHash::Hashed(left_hash);
        choices[1] = NodeHash::Hashed(right_hash);
        let branch: Node = BranchNode {
            choices,
            value: vec![],
        }
        .into();
        let root = import(&store, &branch);

        // Budget of one: the branch is expanded, both children stay pending.
        let inspection = inspect_trie(&store, root, &[], 1).unwrap();
        assert!(inspection.dangling.is_empty());
        assert_eq!(
            inspection.remaining,
            vec![Nibbles::from_hex(vec![0]), Nibbles::from_hex(vec![1])]
        );
    }

    #[test]
    fn malformed_node_fails_the_whole_call() {
        use crate::db::InMemoryTrieDB;
        use std::sync::{Arc, Mutex};

        // import_raw never stores malformed blobs, so plant one through the
        // db directly.
        let garbage = vec![0xc1, 0x01];
        let garbage_hash = crate::node_hash::keccak(&garbage);
        let map = std::collections::HashMap::from([(garbage_hash.as_bytes().to_vec(), garbage)]);
        let db = InMemoryTrieDB::new(Arc::new(Mutex::new(map)));
        let store = NodeStore::new(Arc::new(db));

        assert!(inspect_trie(&store, garbage_hash, &[], 100).is_err());
    }
}
